//! Change notification for presentation layers.
//!
//! The index engine reports every structural change as a sequence of
//! [`IndexEvent`]s. Row events follow the familiar item-model protocol:
//!
//! - **Before modifications**: `RowsAboutToBeInserted` / `RowsAboutToBeRemoved`
//! - **After modifications**: `RowsInserted` / `RowsRemoved`
//! - **Whole rebuilds**: `ResetAboutToBegin` ... `ResetFinished`, with no row
//!   events in between
//! - **In-place changes**: `DataChanged` for a single node
//!
//! All rows are children of the index root; row 0 is the summary node when
//! summaries are enabled.

use crate::scheduler::Ticket;
use crate::types::GroupKey;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Reference to a row-bearing node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// The aggregate summary row
    Summary,
    /// A real group node
    Group(GroupKey),
}

/// Which aspect of a node changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangedField {
    /// Display values (summary labels, column removal)
    Display,
    /// Member set grew or shrank without the node appearing or disappearing
    Members,
    /// Decoration such as cover art became available
    Decoration,
}

/// A structural or data change of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// The whole row set is about to be rebuilt
    ResetAboutToBegin,
    /// The rebuild finished; views should re-read every row
    ResetFinished,
    /// Rows `first..=last` are about to be inserted
    RowsAboutToBeInserted { first: usize, last: usize },
    /// Rows `first..=last` were inserted
    RowsInserted { first: usize, last: usize },
    /// Rows `first..=last` are about to be removed
    RowsAboutToBeRemoved { first: usize, last: usize },
    /// Rows `first..=last` were removed
    RowsRemoved { first: usize, last: usize },
    /// Columns `first..=last` are about to be removed
    ColumnsAboutToBeRemoved { first: usize, last: usize },
    /// Columns `first..=last` were removed
    ColumnsRemoved { first: usize, last: usize },
    /// A node's presentation changed in place
    DataChanged {
        node: NodeRef,
        fields: Vec<ChangedField>,
    },
    /// A computed batch has been folded into the index
    BatchApplied { ticket: Ticket },
}

impl fmt::Display for IndexEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexEvent::ResetAboutToBegin => write!(f, "reset-begin"),
            IndexEvent::ResetFinished => write!(f, "reset-end"),
            IndexEvent::RowsAboutToBeInserted { first, last } => {
                write!(f, "insert-begin {}..={}", first, last)
            }
            IndexEvent::RowsInserted { first, last } => write!(f, "insert {}..={}", first, last),
            IndexEvent::RowsAboutToBeRemoved { first, last } => {
                write!(f, "remove-begin {}..={}", first, last)
            }
            IndexEvent::RowsRemoved { first, last } => write!(f, "remove {}..={}", first, last),
            IndexEvent::ColumnsAboutToBeRemoved { first, last } => {
                write!(f, "remove-columns-begin {}..={}", first, last)
            }
            IndexEvent::ColumnsRemoved { first, last } => {
                write!(f, "remove-columns {}..={}", first, last)
            }
            IndexEvent::DataChanged { node, fields } => {
                let node = match node {
                    NodeRef::Summary => "summary".to_string(),
                    NodeRef::Group(key) => key.to_string(),
                };
                write!(f, "changed [{}] {:?}", node, fields)
            }
            IndexEvent::BatchApplied { ticket } => write!(f, "batch #{}", ticket),
        }
    }
}

/// Receiver of index events.
///
/// Observers are called synchronously on the apply context. They get a
/// shared reference to the event only and cannot reach back into the engine.
pub trait IndexObserver: Send + Sync {
    /// Called for every emitted event, in order
    fn on_event(&self, event: &IndexEvent);
}

/// Observer forwarding events over a channel.
pub struct ChannelObserver {
    sender: Sender<IndexEvent>,
}

impl ChannelObserver {
    /// Create a new channel-based observer
    pub fn new() -> (Self, Receiver<IndexEvent>) {
        let (sender, receiver) = unbounded();
        (ChannelObserver { sender }, receiver)
    }
}

impl IndexObserver for ChannelObserver {
    fn on_event(&self, event: &IndexEvent) {
        let _ = self.sender.send(event.clone());
    }
}

/// Observer that keeps every event in memory.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<IndexEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain recorded events
    pub fn take(&self) -> Vec<IndexEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl IndexObserver for RecordingObserver {
    fn on_event(&self, event: &IndexEvent) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Reset,
    Insert { first: usize, last: usize },
    Remove { first: usize, last: usize },
    RemoveColumns { first: usize, last: usize },
}

/// Fans events out to observers and enforces bracket pairing.
///
/// A bracket (`begin_*` .. `end_*`) covers exactly one atomic change. Brackets
/// never nest, and row brackets are suppressed while a reset is open since
/// the reset already tells views to re-read everything.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: Vec<Arc<dyn IndexObserver>>,
    open: Option<Bracket>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&mut self, observer: Arc<dyn IndexObserver>) {
        self.observers.push(observer);
    }

    /// True while a reset bracket is open
    pub fn in_reset(&self) -> bool {
        self.open == Some(Bracket::Reset)
    }

    fn emit(&self, event: IndexEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    fn open_bracket(&mut self, bracket: Bracket) {
        assert!(
            self.open.is_none(),
            "change bracket {:?} opened while {:?} is still open",
            bracket,
            self.open
        );
        self.open = Some(bracket);
    }

    fn close_bracket(&mut self, bracket: Bracket) {
        assert_eq!(
            self.open,
            Some(bracket),
            "change bracket closed out of order"
        );
        self.open = None;
    }

    pub fn begin_reset(&mut self) {
        self.open_bracket(Bracket::Reset);
        self.emit(IndexEvent::ResetAboutToBegin);
    }

    pub fn end_reset(&mut self) {
        self.close_bracket(Bracket::Reset);
        self.emit(IndexEvent::ResetFinished);
    }

    /// Open an insertion bracket. Returns false (and emits nothing) inside a reset.
    pub fn begin_insert_rows(&mut self, first: usize, last: usize) -> bool {
        if self.in_reset() {
            return false;
        }
        self.open_bracket(Bracket::Insert { first, last });
        self.emit(IndexEvent::RowsAboutToBeInserted { first, last });
        true
    }

    pub fn end_insert_rows(&mut self, first: usize, last: usize) {
        self.close_bracket(Bracket::Insert { first, last });
        self.emit(IndexEvent::RowsInserted { first, last });
    }

    /// Open a removal bracket. Returns false (and emits nothing) inside a reset.
    pub fn begin_remove_rows(&mut self, first: usize, last: usize) -> bool {
        if self.in_reset() {
            return false;
        }
        self.open_bracket(Bracket::Remove { first, last });
        self.emit(IndexEvent::RowsAboutToBeRemoved { first, last });
        true
    }

    pub fn end_remove_rows(&mut self, first: usize, last: usize) {
        self.close_bracket(Bracket::Remove { first, last });
        self.emit(IndexEvent::RowsRemoved { first, last });
    }

    pub fn begin_remove_columns(&mut self, first: usize, last: usize) {
        self.open_bracket(Bracket::RemoveColumns { first, last });
        self.emit(IndexEvent::ColumnsAboutToBeRemoved { first, last });
    }

    pub fn end_remove_columns(&mut self, first: usize, last: usize) {
        self.close_bracket(Bracket::RemoveColumns { first, last });
        self.emit(IndexEvent::ColumnsRemoved { first, last });
    }

    /// Report an in-place change. Dropped inside a reset.
    pub fn data_changed(&self, node: NodeRef, fields: Vec<ChangedField>) {
        if self.in_reset() {
            return;
        }
        self.emit(IndexEvent::DataChanged { node, fields });
    }

    pub fn batch_applied(&self, ticket: Ticket) {
        self.emit(IndexEvent::BatchApplied { ticket });
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.observers.len())
            .field("open", &self.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> (ChangeNotifier, Arc<RecordingObserver>) {
        let recorder = Arc::new(RecordingObserver::new());
        let mut notifier = ChangeNotifier::new();
        notifier.subscribe(recorder.clone());
        (notifier, recorder)
    }

    #[test]
    fn test_insert_bracket() {
        let (mut notifier, recorder) = notifier();

        assert!(notifier.begin_insert_rows(1, 2));
        notifier.end_insert_rows(1, 2);

        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::RowsAboutToBeInserted { first: 1, last: 2 },
                IndexEvent::RowsInserted { first: 1, last: 2 },
            ]
        );
    }

    #[test]
    fn test_rows_suppressed_during_reset() {
        let (mut notifier, recorder) = notifier();

        notifier.begin_reset();
        assert!(!notifier.begin_insert_rows(0, 3));
        notifier.data_changed(NodeRef::Summary, vec![ChangedField::Display]);
        notifier.end_reset();

        assert_eq!(
            recorder.take(),
            vec![IndexEvent::ResetAboutToBegin, IndexEvent::ResetFinished]
        );
    }

    #[test]
    #[should_panic(expected = "still open")]
    fn test_nested_brackets_panic() {
        let (mut notifier, _recorder) = notifier();
        notifier.begin_remove_rows(0, 0);
        notifier.begin_insert_rows(1, 1);
    }

    #[test]
    fn test_channel_observer() {
        let (observer, receiver) = ChannelObserver::new();
        let mut notifier = ChangeNotifier::new();
        notifier.subscribe(Arc::new(observer));

        notifier.batch_applied(7);

        let event = receiver.try_recv().unwrap();
        assert_eq!(event, IndexEvent::BatchApplied { ticket: 7 });
        assert_eq!(event.to_string(), "batch #7");
    }
}
