//! Helpers for tests that need to hold a computation in flight.

use crate::extract::{FieldExtractor, KeyExtractor};
use crate::types::{Column, Item};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Field extractor that blocks while its gate is closed.
///
/// The gate starts closed. [`Gate::release`] lets the next blocked (or
/// future) extraction through and leaves the gate open until
/// [`Gate::close`] is called again.
pub(crate) struct GatedExtractor {
    inner: FieldExtractor,
    closed: Arc<AtomicBool>,
    tokens: Receiver<()>,
}

/// Control handle for a [`GatedExtractor`].
pub(crate) struct Gate {
    closed: Arc<AtomicBool>,
    tokens: Sender<()>,
}

impl Gate {
    pub(crate) fn release(&self) {
        let _ = self.tokens.send(());
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl GatedExtractor {
    pub(crate) fn new() -> (Arc<GatedExtractor>, Gate) {
        let (tx, rx) = unbounded();
        let closed = Arc::new(AtomicBool::new(true));
        let extractor = GatedExtractor {
            inner: FieldExtractor::new().with_split(";"),
            closed: Arc::clone(&closed),
            tokens: rx,
        };
        (Arc::new(extractor), Gate { closed, tokens: tx })
    }
}

impl KeyExtractor for GatedExtractor {
    fn extract(&self, item: &Item, column: &Column) -> String {
        if self.closed.load(Ordering::Acquire) {
            let _ = self.tokens.recv();
            self.closed.store(false, Ordering::Release);
        }
        self.inner.extract(item, column)
    }
}

/// Spin until `condition` holds, failing the test after five seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}
