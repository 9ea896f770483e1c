//! The incremental grouped index.
//!
//! [`IndexEngine`] owns the group nodes, the reverse index from items to the
//! groups they belong to, and the optional summary row. Mutations that need
//! key extraction are computed on the [`Scheduler`]'s worker thread and folded
//! back in by [`IndexEngine::poll`] or [`IndexEngine::wait_idle`] on the
//! caller's thread. Removals need no extraction and apply immediately.
//!
//! ## Phases
//!
//! The engine is always in one of three [`EnginePhase`]s. Between batches it
//! is fully readable. While a batch is being folded in, every public mutation
//! panics: observers are notified synchronously and must not re-enter.
//!
//! ## Resets
//!
//! A reset flags all in-flight work as superseded and queues a full rebuild.
//! The first batch to arrive afterwards, whether the rebuild itself or a
//! stale incremental batch, clears the index inside a reset bracket and is
//! folded in as fresh inserts. Later batches merge on top. A rebuild that was
//! itself replaced by a newer reset is dropped.
//!
//! ## Example
//!
//! ```no_run
//! use sift_core::{Column, FieldExtractor, IndexEngine, Item};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut engine = IndexEngine::new(Arc::new(FieldExtractor::new())).unwrap();
//! engine.reset(
//!     vec![Column::new("artist", "Artist")],
//!     vec![Item::new(1).with_field("artist", "Nina Simone")],
//! );
//! engine.wait_idle(Duration::from_secs(1));
//! assert_eq!(engine.len(), 1);
//! ```

use crate::computer::{GroupComputer, PendingBatch, DEFAULT_PARALLEL_THRESHOLD};
use crate::config::Config;
use crate::error::{Result, SiftError};
use crate::extract::{FieldExtractor, KeyExtractor};
use crate::node::{summarize, GroupNode, SummaryNode};
use crate::notifier::{ChangeNotifier, ChangedField, IndexObserver, NodeRef};
use crate::query::NodeQuery;
use crate::scheduler::{CompletedJob, JobKind, Scheduler, Submission, Ticket};
use crate::types::{Column, GroupKey, IndexStats, Item, ItemId};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Engine shared between a UI thread and a library watcher.
pub type SharedEngine = Arc<Mutex<IndexEngine>>;

/// Where the engine is in its batch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No computation outstanding
    Idle,
    /// At least one computation queued or running; state is readable and unchanged
    AwaitingBatch,
    /// A batch is being folded in
    Applying,
}

/// Construction options for [`IndexEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Initial grouping columns (empty means "Unclassified")
    pub columns: Vec<Column>,

    /// Show the summary row
    pub show_summary: bool,

    /// Item count above which extraction runs in parallel
    pub parallel_threshold: usize,

    /// Merge queued incremental requests
    pub coalesce_updates: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            columns: Vec::new(),
            show_summary: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            coalesce_updates: true,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        EngineOptions {
            columns: config.grouping.columns.clone(),
            show_summary: config.grouping.show_summary,
            parallel_threshold: config.performance.parallel_threshold,
            coalesce_updates: config.performance.coalesce_updates,
        }
    }
}

/// The node shown at a given row.
#[derive(Debug, Clone, Copy)]
pub enum RowNode<'a> {
    Summary(&'a SummaryNode),
    Group(&'a GroupNode),
}

impl<'a> RowNode<'a> {
    /// Display value of `column`
    pub fn column(&self, column: usize) -> &'a str {
        match self {
            RowNode::Summary(summary) => summary.column(column),
            RowNode::Group(node) => node.column(column),
        }
    }
}

/// Inbound notifications from whatever owns the item collection.
pub trait ItemSink {
    /// New items appeared
    fn items_added(&mut self, items: Vec<Item>);

    /// Existing items changed
    fn items_updated(&mut self, items: Vec<Item>);

    /// Items were deleted
    fn items_removed(&mut self, ids: &[ItemId]);

    /// The whole collection was reloaded
    fn full_reload(&mut self, items: Vec<Item>);
}

/// Incrementally maintained grouping of items.
pub struct IndexEngine {
    scheduler: Scheduler,
    notifier: ChangeNotifier,

    /// Layout keys are computed with; fixed until the next reset
    key_columns: Vec<Column>,
    /// Displayed columns
    columns: Vec<Column>,
    /// Position in `key_columns` of each displayed column
    visible: Vec<usize>,
    /// Layout adopted when the pending reset clears the index
    pending_columns: Option<Vec<Column>>,

    nodes: HashMap<GroupKey, GroupNode>,
    rows: Vec<GroupKey>,
    reverse: HashMap<ItemId, BTreeSet<GroupKey>>,
    summary: Option<SummaryNode>,
    show_summary: bool,

    phase: EnginePhase,
    outstanding: usize,
    resetting: bool,
    latest_reset: Option<Ticket>,
    last_ticket: Ticket,
    /// Items removed while batches were in flight, with the newest ticket
    /// issued at removal time
    tombstones: HashMap<ItemId, Ticket>,

    stats: IndexStats,
}

impl IndexEngine {
    /// Create an engine with default options.
    pub fn new(extractor: Arc<dyn KeyExtractor>) -> Result<Self> {
        Self::with_options(extractor, EngineOptions::default())
    }

    /// Create an engine reading fields directly, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor =
            FieldExtractor::new().with_split(config.grouping.multi_value_separator.clone());
        Self::with_options(Arc::new(extractor), EngineOptions::from(config))
    }

    /// Create an engine with explicit options.
    pub fn with_options(extractor: Arc<dyn KeyExtractor>, options: EngineOptions) -> Result<Self> {
        let computer =
            GroupComputer::new(extractor).with_parallel_threshold(options.parallel_threshold);
        let scheduler = Scheduler::new(computer)?.with_coalescing(options.coalesce_updates);

        let columns = normalize_columns(options.columns);
        let summary = options
            .show_summary
            .then(|| summarize(std::iter::empty::<&GroupNode>(), &columns));

        Ok(IndexEngine {
            scheduler,
            notifier: ChangeNotifier::new(),
            visible: (0..columns.len()).collect(),
            key_columns: columns.clone(),
            columns,
            pending_columns: None,
            nodes: HashMap::new(),
            rows: Vec::new(),
            reverse: HashMap::new(),
            summary,
            show_summary: options.show_summary,
            phase: EnginePhase::Idle,
            outstanding: 0,
            resetting: false,
            latest_reset: None,
            last_ticket: 0,
            tombstones: HashMap::new(),
            stats: IndexStats::default(),
        })
    }

    /// Wrap the engine for sharing across threads.
    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    /// Register an observer for change events.
    pub fn subscribe(&mut self, observer: Arc<dyn IndexObserver>) {
        self.notifier.subscribe(observer);
    }

    // === Mutations ===

    /// Replace the column layout and the whole item collection.
    ///
    /// Returns the ticket of the queued rebuild, or `None` when there was
    /// nothing to rebuild and the layout was adopted directly.
    #[instrument(skip(self, columns, items), fields(columns = columns.len(), items = items.len()))]
    pub fn reset(&mut self, columns: Vec<Column>, items: Vec<Item>) -> Option<Ticket> {
        self.ensure_not_applying("reset");
        let columns = normalize_columns(columns);

        if items.is_empty() && self.nodes.is_empty() && self.outstanding == 0 {
            debug!("Nothing to rebuild, adopting column layout");
            self.notifier.begin_reset();
            self.pending_columns = Some(columns);
            self.clear();
            self.notifier.end_reset();
            self.stats.resets += 1;
            return None;
        }

        let superseded = self.scheduler.supersede_all();
        if superseded > 0 {
            debug!(superseded, "Superseding in-flight computations");
        }

        info!("Rebuilding index");
        self.resetting = true;
        self.pending_columns = Some(columns);
        let ticket = self.dispatch(JobKind::Reset, items);
        self.latest_reset = Some(ticket);
        Some(ticket)
    }

    /// Queue items that are not yet indexed.
    ///
    /// Items already present are ignored; use [`update_items`](Self::update_items)
    /// for changes. Returns the ticket carrying the items, if any were queued.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn add_items(&mut self, items: Vec<Item>) -> Option<Ticket> {
        self.ensure_not_applying("add_items");

        // Everything indexed now is about to be cleared by the pending reset.
        let items: Vec<Item> = if self.resetting {
            items
        } else {
            items
                .into_iter()
                .filter(|item| !self.reverse.contains_key(&item.id))
                .collect()
        };

        if items.is_empty() {
            return None;
        }
        Some(self.dispatch(JobKind::Add, items))
    }

    /// Queue changed items for regrouping.
    ///
    /// Items the index does not know yet are added instead. Returns the last
    /// ticket queued; once it is applied, every item passed here is in place.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn update_items(&mut self, items: Vec<Item>) -> Option<Ticket> {
        self.ensure_not_applying("update_items");

        if items.is_empty() {
            return None;
        }
        if self.resetting {
            return Some(self.dispatch(JobKind::Add, items));
        }

        let (known, unknown): (Vec<Item>, Vec<Item>) = items
            .into_iter()
            .partition(|item| self.reverse.contains_key(&item.id));

        let mut ticket = None;
        if !known.is_empty() {
            ticket = Some(self.dispatch(JobKind::Update, known));
        }
        if !unknown.is_empty() {
            ticket = Some(self.dispatch(JobKind::Add, unknown));
        }
        ticket
    }

    /// Remove items immediately. Unknown ids are ignored.
    ///
    /// Returns how many items were actually indexed.
    #[instrument(skip_all, fields(items = ids.len()))]
    pub fn remove_items(&mut self, ids: &[ItemId]) -> usize {
        self.ensure_not_applying("remove_items");

        if self.outstanding > 0 {
            for &id in ids {
                self.tombstones.insert(id, self.last_ticket);
            }
        }

        let removed = self.remove_members(ids.iter().copied());
        if removed > 0 {
            debug!(removed, "Removed items");
            self.refresh_summary();
        }
        removed
    }

    /// Stop displaying a column.
    ///
    /// Group keys are left untouched, so no node is recomputed. Returns false
    /// if `column` is out of range.
    #[instrument(skip(self))]
    pub fn remove_column(&mut self, column: usize) -> bool {
        self.ensure_not_applying("remove_column");

        if column >= self.columns.len() {
            return false;
        }

        self.notifier.begin_remove_columns(column, column);
        let hidden = self.columns.remove(column);
        self.visible.remove(column);
        for node in self.nodes.values_mut() {
            node.remove_column(column);
        }
        // A pending layout replaces the visible one wholesale; only drop the
        // hidden column if that layout carries it too.
        if let Some(pending) = self.pending_columns.as_mut() {
            if let Some(position) = pending.iter().position(|c| *c == hidden) {
                pending.remove(position);
                if pending.is_empty() {
                    pending.push(Column::unclassified());
                }
            }
        }
        self.notifier.end_remove_columns(column, column);

        self.refresh_summary();
        true
    }

    /// Show or hide the summary row at row 0.
    pub fn set_summary_enabled(&mut self, enabled: bool) {
        self.ensure_not_applying("set_summary_enabled");

        if self.show_summary == enabled {
            return;
        }
        self.show_summary = enabled;

        if enabled {
            let summary = summarize(self.nodes(), &self.columns);
            let bracketed = self.notifier.begin_insert_rows(0, 0);
            self.summary = Some(summary);
            if bracketed {
                self.notifier.end_insert_rows(0, 0);
            }
        } else {
            let bracketed = self.notifier.begin_remove_rows(0, 0);
            self.summary = None;
            if bracketed {
                self.notifier.end_remove_rows(0, 0);
            }
        }
    }

    /// Tell views that decoration for `item` (e.g. cover art) is available.
    ///
    /// Emits one decoration change per node containing the item and returns
    /// how many were emitted.
    pub fn decoration_ready(&self, item: ItemId) -> usize {
        match self.reverse.get(&item) {
            Some(keys) => {
                for key in keys {
                    self.notifier
                        .data_changed(NodeRef::Group(key.clone()), vec![ChangedField::Decoration]);
                }
                keys.len()
            }
            None => 0,
        }
    }

    // === Batch delivery ===

    /// Apply every batch that has finished computing, without blocking.
    ///
    /// Returns the number of batches applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some(job) = self.scheduler.try_next() {
            self.apply(job);
            applied += 1;
        }
        applied
    }

    /// Apply batches until nothing is outstanding or `timeout` elapses.
    ///
    /// Returns true if the engine is idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.scheduler.next_timeout(remaining) {
                Some(job) => self.apply(job),
                None => return false,
            }
        }
        true
    }

    fn apply(&mut self, job: CompletedJob) {
        assert!(
            self.phase != EnginePhase::Applying,
            "batch {} delivered while another batch is being applied",
            job.ticket
        );

        self.outstanding = self.outstanding.saturating_sub(1);
        self.phase = EnginePhase::Applying;
        let ticket = job.ticket;

        if job.kind == JobKind::Reset && self.latest_reset != Some(ticket) {
            warn!(ticket, "Dropping rebuild replaced by a newer reset");
        } else {
            self.fold_job(job);
            self.stats.batches_applied += 1;
            self.stats.last_applied = Some(Utc::now());
        }

        self.tombstones.retain(|_, removed_at| *removed_at > ticket);
        self.phase = if self.outstanding > 0 {
            EnginePhase::AwaitingBatch
        } else {
            EnginePhase::Idle
        };

        debug_assert!(
            self.check_consistency().is_ok(),
            "index inconsistent after batch {}: {:?}",
            ticket,
            self.check_consistency()
        );
        self.notifier.batch_applied(ticket);
    }

    fn fold_job(&mut self, job: CompletedJob) {
        let CompletedJob {
            ticket,
            kind,
            columns,
            superseded,
            mut batch,
            items,
            took,
        } = job;

        let clearing = self.resetting;
        if clearing {
            self.notifier.begin_reset();
            self.clear();
        }

        if columns != self.key_columns {
            let items: Vec<Item> = items
                .into_iter()
                .filter(|item| !self.is_tombstoned(item.id, ticket))
                .collect();
            warn!(
                ticket,
                kind = %kind,
                items = items.len(),
                "Batch computed for a replaced column layout, recomputing"
            );
            if !items.is_empty() {
                self.dispatch(JobKind::Add, items);
            }
        } else {
            self.drop_tombstoned(&mut batch, ticket);

            let removed = if clearing {
                0
            } else {
                self.remove_members(batch.requested.iter().copied())
            };
            let (created, grown) = self.fold(batch);

            if clearing {
                info!(
                    ticket,
                    kind = %kind,
                    groups = created,
                    took_ms = took.as_millis() as u64,
                    "Index rebuilt"
                );
            } else {
                debug!(
                    ticket,
                    kind = %kind,
                    superseded,
                    removed,
                    created,
                    grown,
                    took_ms = took.as_millis() as u64,
                    "Applied batch"
                );
            }
        }

        self.refresh_summary();

        if clearing {
            self.notifier.end_reset();
            self.stats.resets += 1;
        }
    }

    /// Insert a batch's groups. Returns (nodes created, existing nodes grown).
    fn fold(&mut self, batch: PendingBatch) -> (usize, usize) {
        let mut created: Vec<GroupNode> = Vec::new();
        let mut grown: Vec<GroupKey> = Vec::new();

        for (key, group) in batch.groups {
            if let Some(node) = self.nodes.get_mut(&key) {
                let mut added = false;
                for &id in &group.members {
                    added |= node.insert(id);
                    self.reverse.entry(id).or_default().insert(key.clone());
                }
                if added {
                    grown.push(key);
                }
            } else {
                let display = self
                    .visible
                    .iter()
                    .map(|&i| group.display.get(i).cloned().unwrap_or_default())
                    .collect();
                let mut node = GroupNode::new(key, display);
                for &id in &group.members {
                    node.insert(id);
                }
                created.push(node);
            }
        }

        let counts = (created.len(), grown.len());

        if !created.is_empty() {
            let first = self.row_offset() + self.rows.len();
            let last = first + created.len() - 1;
            let bracketed = self.notifier.begin_insert_rows(first, last);

            for node in created {
                let key = node.key().clone();
                for &id in node.members() {
                    self.reverse.entry(id).or_default().insert(key.clone());
                }
                self.rows.push(key.clone());
                self.nodes.insert(key, node);
            }

            if bracketed {
                self.notifier.end_insert_rows(first, last);
            }
        }

        for key in grown {
            self.notifier
                .data_changed(NodeRef::Group(key), vec![ChangedField::Members]);
        }

        counts
    }

    /// Detach items from their nodes and drop nodes left empty.
    ///
    /// Returns how many of the ids were indexed.
    fn remove_members(&mut self, ids: impl IntoIterator<Item = ItemId>) -> usize {
        let mut touched: BTreeSet<GroupKey> = BTreeSet::new();
        let mut removed = 0;

        for id in ids {
            if let Some(keys) = self.reverse.remove(&id) {
                removed += 1;
                for key in keys {
                    if let Some(node) = self.nodes.get_mut(&key) {
                        node.remove(id);
                    }
                    touched.insert(key);
                }
            }
        }

        if touched.is_empty() {
            return removed;
        }

        let emptied: HashSet<&GroupKey> = touched
            .iter()
            .filter(|key| self.nodes.get(*key).map_or(false, GroupNode::is_empty))
            .collect();

        // Highest row first so lower row numbers stay valid.
        let positions: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, key)| emptied.contains(key))
            .map(|(pos, _)| pos)
            .collect();

        let offset = self.row_offset();
        for pos in positions {
            let row = offset + pos;
            let bracketed = self.notifier.begin_remove_rows(row, row);
            let key = self.rows.remove(pos);
            self.nodes.remove(&key);
            if bracketed {
                self.notifier.end_remove_rows(row, row);
            }
        }

        for key in &touched {
            if self.nodes.contains_key(key) {
                self.notifier
                    .data_changed(NodeRef::Group(key.clone()), vec![ChangedField::Members]);
            }
        }

        removed
    }

    fn clear(&mut self) {
        if let Some(columns) = self.pending_columns.take() {
            self.visible = (0..columns.len()).collect();
            self.key_columns = columns.clone();
            self.columns = columns;
        }

        self.nodes.clear();
        self.rows.clear();
        self.reverse.clear();
        self.resetting = false;

        if self.show_summary {
            self.summary = Some(summarize(std::iter::empty::<&GroupNode>(), &self.columns));
        }
    }

    fn refresh_summary(&mut self) {
        if !self.show_summary {
            return;
        }

        let summary = summarize(self.nodes(), &self.columns);
        if self.summary.as_ref() != Some(&summary) {
            self.summary = Some(summary);
            self.notifier
                .data_changed(NodeRef::Summary, vec![ChangedField::Display]);
        }
    }

    fn dispatch(&mut self, kind: JobKind, items: Vec<Item>) -> Ticket {
        for item in &items {
            self.tombstones.remove(&item.id);
        }

        let columns = self
            .pending_columns
            .clone()
            .unwrap_or_else(|| self.key_columns.clone());

        let submission = self.scheduler.submit(kind, columns, items);
        if let Submission::Queued(ticket) = submission {
            self.outstanding += 1;
            self.last_ticket = ticket;
        }
        if self.phase == EnginePhase::Idle {
            self.phase = EnginePhase::AwaitingBatch;
        }

        submission.ticket()
    }

    fn is_tombstoned(&self, id: ItemId, ticket: Ticket) -> bool {
        self.tombstones
            .get(&id)
            .map_or(false, |&removed_at| removed_at >= ticket)
    }

    fn drop_tombstoned(&self, batch: &mut PendingBatch, ticket: Ticket) {
        if self.tombstones.is_empty() {
            return;
        }

        let dropped: BTreeSet<ItemId> = batch
            .requested
            .iter()
            .copied()
            .filter(|&id| self.is_tombstoned(id, ticket))
            .collect();
        if dropped.is_empty() {
            return;
        }

        debug!(
            ticket,
            items = dropped.len(),
            "Skipping items removed while their batch was in flight"
        );
        batch.requested.retain(|id| !dropped.contains(id));
        batch.groups.retain(|_, group| {
            group.members.retain(|id| !dropped.contains(id));
            !group.members.is_empty()
        });
    }

    fn ensure_not_applying(&self, operation: &str) {
        assert!(
            self.phase != EnginePhase::Applying,
            "{} called while a batch is being applied",
            operation
        );
    }

    fn row_offset(&self) -> usize {
        usize::from(self.summary.is_some())
    }

    // === Queries ===

    /// Current lifecycle phase
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// True when no computation is outstanding
    pub fn is_idle(&self) -> bool {
        self.phase == EnginePhase::Idle
    }

    /// True while the worker thread is computing
    pub fn is_computing(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// Number of queued or running computations not yet applied
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Displayed columns, in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether the summary row is shown
    pub fn summary_enabled(&self) -> bool {
        self.show_summary
    }

    /// The summary row, if enabled
    pub fn summary(&self) -> Option<&SummaryNode> {
        self.summary.as_ref()
    }

    /// Number of group nodes (excluding the summary)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of indexed items
    pub fn item_count(&self) -> usize {
        self.reverse.len()
    }

    /// Number of rows under the root, summary included
    pub fn row_count(&self) -> usize {
        self.row_offset() + self.rows.len()
    }

    /// Group nodes in row order.
    pub fn nodes(&self) -> impl Iterator<Item = &GroupNode> + '_ {
        self.rows.iter().filter_map(move |key| self.nodes.get(key))
    }

    /// Look up a node by key
    pub fn node(&self, key: &GroupKey) -> Option<&GroupNode> {
        self.nodes.get(key)
    }

    /// The node at `row`.
    pub fn node_at_row(&self, row: usize) -> Option<RowNode<'_>> {
        let offset = self.row_offset();
        if row < offset {
            return self.summary.as_ref().map(RowNode::Summary);
        }
        self.rows
            .get(row - offset)
            .and_then(|key| self.nodes.get(key))
            .map(RowNode::Group)
    }

    /// Row of a node, if present.
    pub fn row_of(&self, node: &NodeRef) -> Option<usize> {
        match node {
            NodeRef::Summary => self.summary.as_ref().map(|_| 0),
            NodeRef::Group(key) => self
                .rows
                .iter()
                .position(|k| k == key)
                .map(|pos| pos + self.row_offset()),
        }
    }

    /// Nodes whose key is in `keys`, in row order. Unknown keys are skipped.
    pub fn nodes_for_keys(&self, keys: &[GroupKey]) -> Vec<&GroupNode> {
        let wanted: HashSet<&GroupKey> = keys.iter().collect();
        self.nodes().filter(|node| wanted.contains(node.key())).collect()
    }

    /// Members of the node with `key`
    pub fn items_of_node(&self, key: &GroupKey) -> Option<&BTreeSet<ItemId>> {
        self.nodes.get(key).map(GroupNode::members)
    }

    /// Keys of every node containing `item`
    pub fn keys_of_item(&self, item: ItemId) -> Option<&BTreeSet<GroupKey>> {
        self.reverse.get(&item)
    }

    /// Nodes matching `query`, in row order.
    pub fn filter(&self, query: &NodeQuery) -> Vec<&GroupNode> {
        self.nodes()
            .filter(|node| query.matches(node, &self.columns))
            .collect()
    }

    /// Index statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            node_count: self.nodes.len(),
            item_count: self.reverse.len(),
            ..self.stats.clone()
        }
    }

    /// Verify that nodes, rows and the reverse index agree.
    pub fn check_consistency(&self) -> Result<()> {
        for (&item, keys) in &self.reverse {
            if keys.is_empty() {
                return Err(SiftError::InvariantViolation(format!(
                    "item {} has an empty key set",
                    item
                )));
            }
            for key in keys {
                match self.nodes.get(key) {
                    Some(node) if node.contains(item) => {}
                    _ => {
                        return Err(SiftError::DanglingReverseEntry {
                            item,
                            key: key.clone(),
                        })
                    }
                }
            }
        }

        for (key, node) in &self.nodes {
            if node.is_empty() {
                return Err(SiftError::OrphanNode { key: key.clone() });
            }
            for &item in node.members() {
                if !self.reverse.get(&item).map_or(false, |keys| keys.contains(key)) {
                    return Err(SiftError::MissingReverseEntry {
                        item,
                        key: key.clone(),
                    });
                }
            }
        }

        if self.rows.len() != self.nodes.len()
            || !self.rows.iter().all(|key| self.nodes.contains_key(key))
        {
            return Err(SiftError::InvariantViolation(
                "row order out of sync with node map".to_string(),
            ));
        }

        if self.show_summary != self.summary.is_some() {
            return Err(SiftError::InvariantViolation(
                "summary row does not match summary setting".to_string(),
            ));
        }

        Ok(())
    }
}

impl ItemSink for IndexEngine {
    fn items_added(&mut self, items: Vec<Item>) {
        self.add_items(items);
    }

    fn items_updated(&mut self, items: Vec<Item>) {
        self.update_items(items);
    }

    fn items_removed(&mut self, ids: &[ItemId]) {
        self.remove_items(ids);
    }

    fn full_reload(&mut self, items: Vec<Item>) {
        let columns = self
            .pending_columns
            .clone()
            .unwrap_or_else(|| self.columns.clone());
        self.reset(columns, items);
    }
}

impl fmt::Debug for IndexEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexEngine")
            .field("phase", &self.phase)
            .field("columns", &self.columns)
            .field("nodes", &self.nodes.len())
            .field("items", &self.reverse.len())
            .field("outstanding", &self.outstanding)
            .field("resetting", &self.resetting)
            .finish()
    }
}

fn normalize_columns(columns: Vec<Column>) -> Vec<Column> {
    if columns.is_empty() {
        vec![Column::unclassified()]
    } else {
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{IndexEvent, RecordingObserver};
    use crate::query::parse_query;
    use crate::testing::{wait_until, GatedExtractor};
    use std::collections::BTreeMap;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn artist(id: u64, name: &str) -> Item {
        Item::new(id).with_field("artist", name)
    }

    fn track(id: u64, artist: &str, genre: &str) -> Item {
        Item::new(id)
            .with_field("artist", artist)
            .with_field("genre", genre)
    }

    fn artist_columns() -> Vec<Column> {
        vec![Column::new("artist", "Artist")]
    }

    fn genre_columns() -> Vec<Column> {
        vec![Column::new("genre", "Genre")]
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("sift_core=debug")
            .try_init();
    }

    fn engine() -> (IndexEngine, Arc<RecordingObserver>) {
        let engine = IndexEngine::new(Arc::new(FieldExtractor::new().with_split(";"))).unwrap();
        observed(engine)
    }

    fn observed(mut engine: IndexEngine) -> (IndexEngine, Arc<RecordingObserver>) {
        init_tracing();
        let recorder = Arc::new(RecordingObserver::new());
        engine.subscribe(recorder.clone());
        (engine, recorder)
    }

    fn settle(engine: &mut IndexEngine) {
        assert!(engine.wait_idle(TIMEOUT), "engine did not become idle");
        engine.check_consistency().unwrap();
    }

    /// Group key -> member ids, independent of row order
    fn partition(engine: &IndexEngine) -> BTreeMap<String, Vec<u64>> {
        engine
            .nodes()
            .map(|node| {
                (
                    node.key().to_string(),
                    node.members().iter().map(|id| id.as_u64()).collect(),
                )
            })
            .collect()
    }

    fn loaded(items: Vec<Item>) -> (IndexEngine, Arc<RecordingObserver>) {
        let (mut engine, recorder) = engine();
        engine.reset(artist_columns(), items);
        settle(&mut engine);
        recorder.take();
        (engine, recorder)
    }

    fn changed(key: &str, field: ChangedField) -> IndexEvent {
        IndexEvent::DataChanged {
            node: NodeRef::Group(GroupKey::new(key)),
            fields: vec![field],
        }
    }

    fn summary_changed() -> IndexEvent {
        IndexEvent::DataChanged {
            node: NodeRef::Summary,
            fields: vec![ChangedField::Display],
        }
    }

    #[test]
    fn test_initial_load() {
        let (mut engine, recorder) = engine();

        let ticket = engine.reset(artist_columns(), vec![artist(1, "A"), artist(2, "B")]);
        assert_eq!(ticket, Some(1));
        assert_eq!(engine.phase(), EnginePhase::AwaitingBatch);
        settle(&mut engine);

        assert!(engine.is_idle());
        assert_eq!(engine.row_count(), 3);
        assert_eq!(engine.node_at_row(0).unwrap().column(0), "All (2 artists)");
        match engine.node_at_row(1) {
            Some(RowNode::Group(node)) => {
                assert_eq!(node.column(0), "A");
                assert_eq!(node.members(), &BTreeSet::from([ItemId(1)]));
            }
            other => panic!("unexpected row 1: {:?}", other),
        }
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::ResetAboutToBegin,
                IndexEvent::ResetFinished,
                IndexEvent::BatchApplied { ticket: 1 },
            ]
        );
    }

    #[test]
    fn test_update_moves_item_between_nodes() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A"), artist(2, "B")]);

        engine.update_items(vec![artist(1, "B")]);
        settle(&mut engine);

        assert_eq!(partition(&engine), BTreeMap::from([("B".to_string(), vec![1, 2])]));
        assert_eq!(
            engine.keys_of_item(ItemId(1)),
            Some(&BTreeSet::from([GroupKey::new("B")]))
        );
        assert_eq!(engine.summary().unwrap().column(0), "All (1 artists)");
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::RowsAboutToBeRemoved { first: 1, last: 1 },
                IndexEvent::RowsRemoved { first: 1, last: 1 },
                changed("B", ChangedField::Members),
                summary_changed(),
                IndexEvent::BatchApplied { ticket: 2 },
            ]
        );
    }

    #[test]
    fn test_remove_items_descending_rows() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A"), artist(2, "B")]);

        assert_eq!(engine.remove_items(&[ItemId(1), ItemId(2)]), 2);

        assert!(engine.is_empty());
        assert_eq!(engine.row_count(), 1);
        assert_eq!(engine.summary().unwrap().column(0), "All (0 artists)");
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::RowsAboutToBeRemoved { first: 2, last: 2 },
                IndexEvent::RowsRemoved { first: 2, last: 2 },
                IndexEvent::RowsAboutToBeRemoved { first: 1, last: 1 },
                IndexEvent::RowsRemoved { first: 1, last: 1 },
                summary_changed(),
            ]
        );
        engine.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_shrinking_node_reports_members() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A"), artist(2, "A")]);

        engine.remove_items(&[ItemId(1)]);

        assert_eq!(recorder.take(), vec![changed("A", ChangedField::Members)]);
        assert_eq!(engine.items_of_node(&GroupKey::new("A")).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A")]);

        assert_eq!(engine.remove_items(&[ItemId(99)]), 0);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A")]);

        assert_eq!(engine.add_items(vec![artist(1, "A")]), None);
        assert_eq!(engine.poll(), 0);
        assert!(engine.is_idle());
        assert!(recorder.take().is_empty());
        assert_eq!(partition(&engine), BTreeMap::from([("A".to_string(), vec![1])]));
    }

    #[test]
    fn test_add_appends_rows() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A"), artist(2, "B")]);

        engine.add_items(vec![artist(3, "C"), artist(4, "D")]);
        settle(&mut engine);

        assert_eq!(engine.row_of(&NodeRef::Group(GroupKey::new("C"))), Some(3));
        assert_eq!(engine.row_of(&NodeRef::Group(GroupKey::new("D"))), Some(4));
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::RowsAboutToBeInserted { first: 3, last: 4 },
                IndexEvent::RowsInserted { first: 3, last: 4 },
                summary_changed(),
                IndexEvent::BatchApplied { ticket: 2 },
            ]
        );
    }

    #[test]
    fn test_add_to_existing_node() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A")]);

        engine.add_items(vec![artist(2, "A")]);
        settle(&mut engine);

        assert_eq!(
            recorder.take(),
            vec![
                changed("A", ChangedField::Members),
                IndexEvent::BatchApplied { ticket: 2 },
            ]
        );
    }

    #[test]
    fn test_update_of_unknown_item_adds_it() {
        let (mut engine, _recorder) = loaded(vec![artist(1, "A")]);

        engine.update_items(vec![artist(1, "A"), artist(2, "B")]);
        settle(&mut engine);

        assert_eq!(
            partition(&engine),
            BTreeMap::from([("A".to_string(), vec![1]), ("B".to_string(), vec![2])])
        );
    }

    #[test]
    fn test_empty_reset_adopts_columns() {
        let (mut engine, recorder) = engine();

        assert_eq!(engine.reset(genre_columns(), Vec::new()), None);

        assert!(engine.is_idle());
        assert_eq!(engine.columns(), genre_columns().as_slice());
        assert_eq!(engine.summary().unwrap().column(0), "All (0 genres)");
        assert_eq!(
            recorder.take(),
            vec![IndexEvent::ResetAboutToBegin, IndexEvent::ResetFinished]
        );
    }

    #[test]
    fn test_no_columns_groups_as_unclassified() {
        let (mut engine, _recorder) = engine();

        engine.reset(Vec::new(), vec![artist(1, "A"), artist(2, "B")]);
        settle(&mut engine);

        assert_eq!(engine.len(), 1);
        let node = engine.nodes().next().unwrap();
        assert_eq!(node.column(0), "Unclassified");
        assert_eq!(node.member_count(), 2);
    }

    #[test]
    fn test_multi_value_membership() {
        let (mut engine, recorder) = engine();
        engine.reset(genre_columns(), vec![track(1, "A", "Rock; Jazz"), track(2, "B", "Rock")]);
        settle(&mut engine);
        recorder.take();

        assert_eq!(engine.len(), 2);
        assert_eq!(engine.keys_of_item(ItemId(1)).unwrap().len(), 2);

        engine.remove_items(&[ItemId(1)]);

        assert_eq!(partition(&engine), BTreeMap::from([("Rock".to_string(), vec![2])]));
        let events = recorder.take();
        assert!(events.contains(&changed("Rock", ChangedField::Members)));
        assert!(events.contains(&IndexEvent::RowsRemoved { first: 1, last: 1 }));
    }

    #[test]
    fn test_decoration_ready() {
        let (mut engine, recorder) = engine();
        engine.reset(genre_columns(), vec![track(1, "A", "Rock; Jazz")]);
        settle(&mut engine);
        recorder.take();

        assert_eq!(engine.decoration_ready(ItemId(1)), 2);
        assert_eq!(engine.decoration_ready(ItemId(7)), 0);
        assert_eq!(
            recorder.take(),
            vec![
                changed("Jazz", ChangedField::Decoration),
                changed("Rock", ChangedField::Decoration),
            ]
        );
    }

    #[test]
    fn test_remove_column() {
        let (mut engine, recorder) = engine();
        let columns = vec![Column::new("artist", "Artist"), Column::new("genre", "Genre")];
        engine.reset(columns, vec![track(1, "A", "Rock"), track(2, "B", "Rock")]);
        settle(&mut engine);
        recorder.take();

        assert!(!engine.remove_column(2));
        assert!(engine.remove_column(0));

        assert_eq!(engine.columns(), genre_columns().as_slice());
        assert_eq!(engine.len(), 2);
        assert!(engine.nodes().all(|node| node.display_columns() == ["Rock"]));
        assert_eq!(engine.summary().unwrap().column(0), "All (1 genres)");
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::ColumnsAboutToBeRemoved { first: 0, last: 0 },
                IndexEvent::ColumnsRemoved { first: 0, last: 0 },
                summary_changed(),
            ]
        );

        // New nodes only show the remaining column.
        engine.add_items(vec![track(3, "C", "Jazz")]);
        settle(&mut engine);
        let key = GroupKey::compose(&["C", "Jazz"]);
        assert_eq!(engine.node(&key).unwrap().display_columns(), ["Jazz"]);
    }

    #[test]
    fn test_remove_column_keeps_unrelated_pending_layout() {
        let (mut engine, _recorder) = engine();
        let columns = vec![Column::new("artist", "Artist"), Column::new("genre", "Genre")];
        let items = vec![
            track(1, "A", "Rock").with_field("year", "1999"),
            track(2, "B", "Jazz").with_field("year", "2001"),
        ];
        engine.reset(columns, items.clone());
        settle(&mut engine);

        engine.reset(vec![Column::new("year", "Year")], items);
        assert!(engine.remove_column(0));
        assert_eq!(engine.columns(), genre_columns().as_slice());
        settle(&mut engine);

        assert_eq!(engine.columns(), [Column::new("year", "Year")]);
        let shown: Vec<&str> = engine.nodes().map(|node| node.column(0)).collect();
        assert_eq!(shown, ["1999", "2001"]);
    }

    #[test]
    fn test_remove_column_shared_with_pending_layout() {
        let (mut engine, _recorder) = engine();
        let columns = vec![Column::new("artist", "Artist"), Column::new("genre", "Genre")];
        let items = vec![track(1, "A", "Rock"), track(2, "B", "Rock")];
        engine.reset(columns.clone(), items.clone());
        settle(&mut engine);

        engine.reset(columns, items);
        assert!(engine.remove_column(0));
        settle(&mut engine);

        assert_eq!(engine.columns(), genre_columns().as_slice());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.nodes().next().unwrap().display_columns(), ["Rock"]);
    }

    #[test]
    fn test_summary_toggle() {
        let (mut engine, recorder) = loaded(vec![artist(1, "A"), artist(2, "B")]);

        engine.set_summary_enabled(false);
        engine.set_summary_enabled(false);

        assert_eq!(engine.row_count(), 2);
        assert!(matches!(engine.node_at_row(0), Some(RowNode::Group(_))));
        assert_eq!(engine.row_of(&NodeRef::Summary), None);

        engine.set_summary_enabled(true);

        assert_eq!(engine.row_count(), 3);
        assert_eq!(engine.node_at_row(0).unwrap().column(0), "All (2 artists)");
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::RowsAboutToBeRemoved { first: 0, last: 0 },
                IndexEvent::RowsRemoved { first: 0, last: 0 },
                IndexEvent::RowsAboutToBeInserted { first: 0, last: 0 },
                IndexEvent::RowsInserted { first: 0, last: 0 },
            ]
        );
        engine.check_consistency().unwrap();
    }

    #[test]
    fn test_rows_without_summary_start_at_zero() {
        let options = EngineOptions {
            show_summary: false,
            ..EngineOptions::default()
        };
        let engine =
            IndexEngine::with_options(Arc::new(FieldExtractor::new()), options).unwrap();
        let (mut engine, recorder) = observed(engine);

        engine.reset(artist_columns(), vec![artist(1, "A")]);
        settle(&mut engine);
        recorder.take();

        engine.add_items(vec![artist(2, "B")]);
        settle(&mut engine);

        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::RowsAboutToBeInserted { first: 1, last: 1 },
                IndexEvent::RowsInserted { first: 1, last: 1 },
                IndexEvent::BatchApplied { ticket: 2 },
            ]
        );
    }

    #[test]
    fn test_queries() {
        let (engine, _recorder) = loaded(vec![
            artist(1, "Nina Simone"),
            artist(2, "Miles Davis"),
            artist(3, "Nina Simone"),
        ]);

        let found = engine.nodes_for_keys(&[
            GroupKey::new("Miles Davis"),
            GroupKey::new("Nina Simone"),
            GroupKey::new("Unknown"),
        ]);
        let keys: Vec<&str> = found.iter().map(|node| node.key().as_str()).collect();
        // Rows follow key order within a batch
        assert_eq!(keys, vec!["Miles Davis", "Nina Simone"]);

        let query = parse_query("simone").unwrap();
        let matched = engine.filter(&query);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].member_count(), 2);

        let stats = engine.stats();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.item_count, 3);
        assert_eq!(stats.resets, 1);
        assert!(stats.last_applied.is_some());
    }

    #[test]
    fn test_reset_during_inflight_add_converges() {
        let (extractor, gate) = GatedExtractor::new();
        let (mut engine, recorder) = observed(IndexEngine::new(extractor).unwrap());

        gate.release();
        engine.reset(artist_columns(), vec![artist(1, "A"), artist(2, "B")]);
        settle(&mut engine);
        recorder.take();

        gate.close();
        engine.add_items(vec![artist(3, "C")]);
        wait_until(|| engine.is_computing());

        engine.reset(artist_columns(), vec![artist(1, "A"), artist(4, "D")]);
        gate.release();
        settle(&mut engine);

        let mut reference = IndexEngine::new(Arc::new(FieldExtractor::new())).unwrap();
        reference.reset(artist_columns(), vec![artist(1, "A"), artist(4, "D")]);
        settle(&mut reference);
        reference.add_items(vec![artist(3, "C")]);
        settle(&mut reference);

        assert_eq!(partition(&engine), partition(&reference));
        assert_eq!(engine.keys_of_item(ItemId(2)), None);

        let resets = recorder
            .take()
            .into_iter()
            .filter(|event| *event == IndexEvent::ResetAboutToBegin)
            .count();
        assert_eq!(resets, 1);
    }

    #[test]
    fn test_replaced_rebuild_is_dropped() {
        let (extractor, gate) = GatedExtractor::new();
        let (mut engine, recorder) = observed(IndexEngine::new(extractor).unwrap());

        engine.reset(artist_columns(), vec![artist(1, "A")]);
        wait_until(|| engine.is_computing());
        engine.reset(artist_columns(), vec![artist(2, "B")]);
        gate.release();
        settle(&mut engine);

        assert_eq!(partition(&engine), BTreeMap::from([("B".to_string(), vec![2])]));
        assert_eq!(engine.stats().resets, 1);
        assert_eq!(
            recorder.take(),
            vec![
                IndexEvent::BatchApplied { ticket: 1 },
                IndexEvent::ResetAboutToBegin,
                IndexEvent::ResetFinished,
                IndexEvent::BatchApplied { ticket: 2 },
            ]
        );
    }

    #[test]
    fn test_layout_change_recomputes_stale_batch() {
        let (extractor, gate) = GatedExtractor::new();
        let mut engine = IndexEngine::new(extractor).unwrap();

        gate.release();
        engine.reset(
            artist_columns(),
            vec![track(1, "A", "Rock"), track(2, "B", "Jazz")],
        );
        settle(&mut engine);

        gate.close();
        engine.add_items(vec![track(3, "C", "Rock")]);
        wait_until(|| engine.is_computing());

        engine.reset(
            genre_columns(),
            vec![track(1, "A", "Rock"), track(2, "B", "Jazz")],
        );
        gate.release();
        settle(&mut engine);

        assert_eq!(engine.columns(), genre_columns().as_slice());
        assert_eq!(
            partition(&engine),
            BTreeMap::from([
                ("Jazz".to_string(), vec![2]),
                ("Rock".to_string(), vec![1, 3]),
            ])
        );
    }

    #[test]
    fn test_remove_while_add_in_flight() {
        let (extractor, gate) = GatedExtractor::new();
        let mut engine = IndexEngine::new(extractor).unwrap();

        gate.release();
        engine.reset(artist_columns(), vec![artist(1, "A")]);
        settle(&mut engine);

        gate.close();
        engine.add_items(vec![artist(2, "B")]);
        wait_until(|| engine.is_computing());

        assert_eq!(engine.remove_items(&[ItemId(2)]), 0);
        gate.release();
        settle(&mut engine);

        assert_eq!(engine.keys_of_item(ItemId(2)), None);
        assert_eq!(partition(&engine), BTreeMap::from([("A".to_string(), vec![1])]));
    }

    #[test]
    fn test_coalesced_updates() {
        let (extractor, gate) = GatedExtractor::new();
        let mut engine = IndexEngine::new(extractor).unwrap();

        gate.release();
        engine.reset(
            artist_columns(),
            vec![artist(1, "A"), artist(2, "B"), artist(3, "C")],
        );
        settle(&mut engine);

        gate.close();
        assert_eq!(engine.update_items(vec![artist(1, "D")]), Some(2));
        wait_until(|| engine.is_computing());

        assert_eq!(engine.update_items(vec![artist(2, "D")]), Some(3));
        assert_eq!(
            engine.update_items(vec![artist(2, "E"), artist(3, "E")]),
            Some(3)
        );
        assert_eq!(engine.outstanding(), 2);

        gate.release();
        settle(&mut engine);

        assert_eq!(
            partition(&engine),
            BTreeMap::from([("D".to_string(), vec![1]), ("E".to_string(), vec![2, 3])])
        );
        assert_eq!(engine.stats().batches_applied, 3);
    }

    #[test]
    fn test_item_sink_full_reload_keeps_columns() {
        let (mut engine, _recorder) = engine();
        engine.reset(genre_columns(), vec![track(1, "A", "Rock")]);
        settle(&mut engine);

        engine.full_reload(vec![track(2, "B", "Jazz")]);
        engine.items_added(vec![track(3, "C", "Jazz")]);
        settle(&mut engine);

        assert_eq!(engine.columns(), genre_columns().as_slice());
        assert_eq!(partition(&engine), BTreeMap::from([("Jazz".to_string(), vec![2, 3])]));

        engine.items_removed(&[ItemId(2), ItemId(3)]);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_shared_engine_across_threads() {
        let (engine, _recorder) = engine();
        let shared = engine.into_shared();
        shared
            .lock()
            .reset(artist_columns(), vec![artist(1, "A"), artist(2, "B")]);

        let writer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let mut engine = shared.lock();
                engine.update_items(vec![artist(2, "A"), artist(3, "C")]);
            })
        };
        let reader = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                wait_until(|| {
                    let mut engine = shared.lock();
                    engine.poll();
                    engine.item_count() > 0
                });
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();

        let mut engine = shared.lock();
        settle(&mut engine);
        assert_eq!(
            partition(&engine),
            BTreeMap::from([
                ("A".to_string(), vec![1, 2]),
                ("C".to_string(), vec![3]),
            ])
        );
    }

    #[test]
    #[should_panic(expected = "while a batch is being applied")]
    fn test_mutation_during_apply_panics() {
        let (mut engine, _recorder) = engine();
        engine.phase = EnginePhase::Applying;
        engine.add_items(vec![artist(1, "A")]);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.grouping.columns = genre_columns();
        config.grouping.show_summary = false;

        let mut engine = IndexEngine::from_config(&config).unwrap();
        engine.full_reload(vec![track(1, "A", "Rock;Pop")]);
        settle(&mut engine);

        assert_eq!(engine.row_count(), 2);
        assert!(engine.summary().is_none());
    }
}
