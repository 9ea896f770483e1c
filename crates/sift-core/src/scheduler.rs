//! Background scheduling of group computations.
//!
//! The [`Scheduler`] owns exactly one worker thread. Jobs are executed one at
//! a time in submission order, and each finished job is handed back to the
//! apply context as an immutable [`CompletedJob`] over a channel.
//!
//! ## Supersession
//!
//! A reset does not tear down work that is already queued or running: it
//! only flags those jobs as superseded. Their results are still delivered,
//! and the index engine decides what they mean.
//!
//! ## Coalescing
//!
//! Incremental requests arriving while an identical kind of job is still
//! waiting at the tail of the queue are merged into it, last write per item
//! winning. This bounds queue growth under bursts of tag edits.

use crate::computer::{GroupComputer, PendingBatch};
use crate::error::Result;
use crate::types::{Column, Item, ItemId};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Monotonically increasing job identifier.
pub type Ticket = u64;

/// What a job was dispatched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Full recomputation of the whole collection
    Reset,
    /// Items not yet in the index
    Add,
    /// Items whose group membership may have changed
    Update,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Reset => write!(f, "reset"),
            JobKind::Add => write!(f, "add"),
            JobKind::Update => write!(f, "update"),
        }
    }
}

/// Outcome of [`Scheduler::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new job was queued under this ticket
    Queued(Ticket),
    /// The request was merged into the already queued job with this ticket
    Coalesced(Ticket),
}

impl Submission {
    /// The ticket whose completion will carry the submitted items
    pub fn ticket(&self) -> Ticket {
        match self {
            Submission::Queued(ticket) | Submission::Coalesced(ticket) => *ticket,
        }
    }
}

/// A finished job, handed from the worker to the apply context.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    /// Ticket assigned at submission
    pub ticket: Ticket,

    /// Why the job was dispatched
    pub kind: JobKind,

    /// Key columns the batch was computed with
    pub columns: Vec<Column>,

    /// True if a reset was requested after this job was submitted
    pub superseded: bool,

    /// The computed groups
    pub batch: PendingBatch,

    /// Items the job was computed from
    pub items: Vec<Item>,

    /// Time spent computing
    pub took: Duration,
}

struct Job {
    ticket: Ticket,
    kind: JobKind,
    columns: Vec<Column>,
    items: Vec<Item>,
    superseded: Arc<AtomicBool>,
}

impl Job {
    /// Merge newer items into this job, replacing older copies of the same id.
    fn absorb(&mut self, items: Vec<Item>) {
        let mut positions: HashMap<ItemId, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id, i))
            .collect();

        for item in items {
            match positions.get(&item.id) {
                Some(&pos) => self.items[pos] = item,
                None => {
                    positions.insert(item.id, self.items.len());
                    self.items.push(item);
                }
            }
        }
    }
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    running: Option<Arc<AtomicBool>>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
}

/// Serializes group computations on one background thread.
pub struct Scheduler {
    shared: Arc<Shared>,
    done_rx: Receiver<CompletedJob>,
    next_ticket: Ticket,
    coalesce: bool,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the worker thread.
    pub fn new(computer: GroupComputer) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Condvar::new(),
        });
        let (done_tx, done_rx) = unbounded::<CompletedJob>();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("sift-grouper".to_string())
            .spawn(move || run_worker(worker_shared, computer, done_tx))?;

        Ok(Scheduler {
            shared,
            done_rx,
            next_ticket: 0,
            coalesce: true,
            worker: Some(worker),
        })
    }

    /// Enable or disable coalescing of queued incremental jobs.
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Queue a computation.
    ///
    /// Reset jobs always get their own ticket. Add and update jobs merge into
    /// a not-yet-started tail job of the same kind and column layout when
    /// coalescing is enabled.
    pub fn submit(&mut self, kind: JobKind, columns: Vec<Column>, items: Vec<Item>) -> Submission {
        let mut state = self.shared.state.lock();

        if self.coalesce && kind != JobKind::Reset {
            if let Some(tail) = state.jobs.back_mut() {
                if tail.kind == kind
                    && tail.columns == columns
                    && !tail.superseded.load(Ordering::Acquire)
                {
                    debug!(
                        ticket = tail.ticket,
                        kind = %kind,
                        items = items.len(),
                        "Coalescing request into queued job"
                    );
                    tail.absorb(items);
                    return Submission::Coalesced(tail.ticket);
                }
            }
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;

        debug!(ticket, kind = %kind, items = items.len(), "Queueing group computation");

        state.jobs.push_back(Job {
            ticket,
            kind,
            columns,
            items,
            superseded: Arc::new(AtomicBool::new(false)),
        });
        drop(state);

        self.shared.wake.notify_one();
        Submission::Queued(ticket)
    }

    /// Flag every queued and running job as superseded.
    ///
    /// Returns how many jobs were flagged.
    pub fn supersede_all(&self) -> usize {
        let state = self.shared.state.lock();
        let mut flagged = 0;

        for flag in state
            .jobs
            .iter()
            .map(|job| &job.superseded)
            .chain(state.running.iter())
        {
            if !flag.swap(true, Ordering::AcqRel) {
                flagged += 1;
            }
        }

        flagged
    }

    /// True while the worker is computing a job.
    pub fn is_busy(&self) -> bool {
        self.shared.state.lock().running.is_some()
    }

    /// Number of jobs waiting to start.
    pub fn queued_len(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    /// Take the next finished job without blocking.
    pub fn try_next(&self) -> Option<CompletedJob> {
        self.done_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next finished job.
    pub fn next_timeout(&self, timeout: Duration) -> Option<CompletedJob> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(job) => Some(job),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("next_ticket", &self.next_ticket)
            .field("coalesce", &self.coalesce)
            .field("queued", &self.queued_len())
            .finish()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.jobs.clear();
            state.shutdown = true;
        }
        self.shared.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(shared: Arc<Shared>, computer: GroupComputer, done_tx: Sender<CompletedJob>) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(job) = state.jobs.pop_front() {
                    state.running = Some(Arc::clone(&job.superseded));
                    break job;
                }
                shared.wake.wait(&mut state);
            }
        };

        let start = Instant::now();
        let batch = computer.compute(&job.items, &job.columns);
        let took = start.elapsed();

        shared.state.lock().running = None;

        trace!(
            ticket = job.ticket,
            groups = batch.group_count(),
            took_us = took.as_micros() as u64,
            "Group computation finished"
        );

        let done = CompletedJob {
            ticket: job.ticket,
            kind: job.kind,
            columns: job.columns,
            superseded: job.superseded.load(Ordering::Acquire),
            batch,
            items: job.items,
            took,
        };

        if done_tx.send(done).is_err() {
            // Scheduler dropped; nobody is listening anymore.
            return;
        }
    }
}
