//! Group key computation.
//!
//! The [`GroupComputer`] turns a set of items and an ordered column list into
//! a [`PendingBatch`]: every distinct composite key with its display values
//! and member items. It never touches index state, which makes it safe to run
//! on the scheduler's worker thread while the index is being read elsewhere.
//!
//! ## Determinism
//!
//! All output collections are ordered maps and sets, so identical inputs
//! always produce an identical partition regardless of whether extraction
//! ran sequentially or in parallel.

use crate::extract::{split_values, KeyExtractor};
use crate::types::{Column, GroupKey, Item, ItemId, UNCLASSIFIED};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Default number of items above which extraction runs in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2000;

/// One group inside a computed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGroup {
    /// Per-column display values, in column order
    pub display: Vec<String>,

    /// Items that belong to this group
    pub members: BTreeSet<ItemId>,
}

/// The immutable result of one computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingBatch {
    /// Items grouped by composite key
    pub groups: BTreeMap<GroupKey, PendingGroup>,

    /// Every item the computation was asked for
    pub requested: BTreeSet<ItemId>,
}

impl PendingBatch {
    /// True when the batch carries no groups
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Keys the given item was assigned to.
    pub fn keys_for(&self, item: ItemId) -> BTreeSet<GroupKey> {
        self.groups
            .iter()
            .filter(|(_, group)| group.members.contains(&item))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Computes composite group keys with a pluggable extractor.
#[derive(Clone)]
pub struct GroupComputer {
    extractor: Arc<dyn KeyExtractor>,
    parallel_threshold: usize,
}

impl std::fmt::Debug for GroupComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupComputer")
            .field("parallel_threshold", &self.parallel_threshold)
            .finish()
    }
}

impl GroupComputer {
    /// Create a computer around the given extractor.
    pub fn new(extractor: Arc<dyn KeyExtractor>) -> Self {
        GroupComputer {
            extractor,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Set the item count above which extraction uses Rayon.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    /// Compute group keys for `items` over `columns`.
    ///
    /// An empty column list groups everything under a single
    /// "Unclassified" group. Zero items yield an empty batch.
    pub fn compute(&self, items: &[Item], columns: &[Column]) -> PendingBatch {
        let implicit = [Column::unclassified()];
        let columns = if columns.is_empty() {
            &implicit[..]
        } else {
            columns
        };

        let assignments: Vec<(ItemId, Vec<(GroupKey, Vec<String>)>)> =
            if items.len() >= self.parallel_threshold {
                items
                    .par_iter()
                    .map(|item| (item.id, self.groups_for(item, columns)))
                    .collect()
            } else {
                items
                    .iter()
                    .map(|item| (item.id, self.groups_for(item, columns)))
                    .collect()
            };

        let mut batch = PendingBatch::default();

        for (id, groups) in assignments {
            batch.requested.insert(id);
            for (key, display) in groups {
                batch
                    .groups
                    .entry(key)
                    .or_insert_with(|| PendingGroup {
                        display,
                        members: BTreeSet::new(),
                    })
                    .members
                    .insert(id);
            }
        }

        batch
    }

    /// Every (key, display values) combination one item belongs to.
    fn groups_for(&self, item: &Item, columns: &[Column]) -> Vec<(GroupKey, Vec<String>)> {
        let per_column: Vec<Vec<String>> = columns
            .iter()
            .map(|column| {
                if column.is_unclassified() {
                    vec![UNCLASSIFIED.to_string()]
                } else {
                    split_values(&self.extractor.extract(item, column))
                }
            })
            .collect();

        // Cartesian product across columns
        let mut combos: Vec<Vec<String>> = vec![Vec::with_capacity(columns.len())];
        for values in &per_column {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut extended = combo.clone();
                    extended.push(value.clone());
                    next.push(extended);
                }
            }
            combos = next;
        }

        combos
            .into_iter()
            .map(|display| (GroupKey::compose(&display), display))
            .collect()
    }
}
