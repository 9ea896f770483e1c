//! Group and summary nodes.

use crate::types::{Column, GroupKey, ItemId};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Placeholder shown for an empty display value.
pub const EMPTY_DISPLAY: &str = "?";

/// All items sharing one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupNode {
    key: GroupKey,
    display: Vec<String>,
    members: BTreeSet<ItemId>,
}

impl GroupNode {
    pub(crate) fn new(key: GroupKey, display: Vec<String>) -> Self {
        GroupNode {
            key,
            display,
            members: BTreeSet::new(),
        }
    }

    /// The node's group key
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Raw display values, one per visible column
    pub fn display_columns(&self) -> &[String] {
        &self.display
    }

    /// Display value of `column`, with `"?"` standing in for empty values.
    pub fn column(&self, column: usize) -> &str {
        match self.display.get(column) {
            Some(value) if !value.is_empty() => value.as_str(),
            _ => EMPTY_DISPLAY,
        }
    }

    /// Member items
    pub fn members(&self) -> &BTreeSet<ItemId> {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.members.contains(&item)
    }

    pub(crate) fn insert(&mut self, item: ItemId) -> bool {
        self.members.insert(item)
    }

    pub(crate) fn remove(&mut self, item: ItemId) -> bool {
        self.members.remove(&item)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn remove_column(&mut self, column: usize) {
        if column < self.display.len() {
            self.display.remove(column);
        }
    }
}

/// Aggregate pseudo-node reporting unique values per column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryNode {
    labels: Vec<String>,
    unique: Vec<usize>,
}

impl SummaryNode {
    /// Label per column, e.g. `"All (2 artists)"`
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Distinct value count per column
    pub fn unique_counts(&self) -> &[usize] {
        &self.unique
    }

    pub fn column(&self, column: usize) -> &str {
        self.labels.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Count distinct display values per column across `nodes`.
pub fn summarize<'a>(
    nodes: impl IntoIterator<Item = &'a GroupNode>,
    columns: &[Column],
) -> SummaryNode {
    let mut uniques: Vec<HashSet<&str>> = vec![HashSet::new(); columns.len()];

    for node in nodes {
        for (column, seen) in uniques.iter_mut().enumerate() {
            if let Some(value) = node.display.get(column) {
                seen.insert(value.as_str());
            }
        }
    }

    let unique: Vec<usize> = uniques.iter().map(HashSet::len).collect();
    let labels = columns
        .iter()
        .zip(&unique)
        .map(|(column, count)| format!("All ({} {}s)", count, column.name.to_lowercase()))
        .collect();

    SummaryNode { labels, unique }
}
