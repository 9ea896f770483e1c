//! Core data types for Sift.
//!
//! This module defines the fundamental data structures shared by the group
//! computer, the scheduler and the index engine. These types are designed to be:
//!
//! - **Immutable in transit**: items and batches cross thread boundaries by value
//! - **Serializable**: library snapshots and CLI output use serde
//! - **Opaque where it matters**: a `GroupKey` is compared, never parsed

use crate::error::{Result, SiftError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between several values of one field (e.g. multiple genres).
pub const MULTI_VALUE_SEPARATOR: char = '\u{1f}';

/// Separator between per-column values inside a `GroupKey`.
pub const KEY_SEPARATOR: char = '\u{1e}';

/// Remove both separators from a raw field value.
///
/// Tag text may contain any character; once stripped, a value can only be
/// split or joined by the index itself.
pub fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != MULTI_VALUE_SEPARATOR && *c != KEY_SEPARATOR)
        .collect()
}

/// Display name of the implicit column used when no columns are configured.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Stable identifier of an externally owned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create a new item ID
    pub fn new(id: u64) -> Self {
        ItemId(id)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        ItemId(id)
    }
}

/// A media item as seen by the index.
///
/// The index never mutates items; it only reads their fields through a
/// [`KeyExtractor`](crate::extract::KeyExtractor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier
    pub id: ItemId,

    /// Tag values keyed by field name (e.g. "artist" -> "Nina Simone")
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Item {
    /// Create an item with no fields.
    pub fn new(id: impl Into<ItemId>) -> Self {
        Item {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field value
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Look up a field, falling back to a case-insensitive match.
    pub fn field(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.fields.get(name) {
            return Some(value.as_str());
        }
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// One grouping dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Field the key extractor reads (e.g. "artist")
    pub field: String,

    /// Human-readable name (e.g. "Artist")
    pub name: String,

    #[serde(skip)]
    implicit: bool,
}

impl Column {
    /// Create a new column
    pub fn new(field: impl Into<String>, name: impl Into<String>) -> Self {
        Column {
            field: field.into(),
            name: name.into(),
            implicit: false,
        }
    }

    /// The implicit column standing in for an empty column list.
    pub fn unclassified() -> Self {
        Column {
            field: String::new(),
            name: UNCLASSIFIED.to_string(),
            implicit: true,
        }
    }

    /// True for the implicit "Unclassified" column
    pub fn is_unclassified(&self) -> bool {
        self.implicit
    }

    /// Parse a column from `field` or `field=Name`.
    ///
    /// Without an explicit name the field is title-cased ("artist" -> "Artist").
    pub fn parse(spec: &str) -> Result<Self> {
        let column = match spec.split_once('=') {
            Some((field, name)) => Column::new(field.trim(), name.trim()),
            None => {
                let field = spec.trim();
                let mut chars = field.chars();
                let name = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                };
                Column::new(field, name)
            }
        };
        column.validate()?;
        Ok(column)
    }

    /// Reject columns that name no field.
    pub fn validate(&self) -> Result<()> {
        if self.field.is_empty() && !self.implicit {
            return Err(SiftError::config(format!(
                "column {:?} has an empty field",
                self.name
            )));
        }
        Ok(())
    }
}

/// Opaque identifier of one distinct combination of column values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub String);

impl GroupKey {
    /// Create a key from a raw string
    pub fn new(key: impl Into<String>) -> Self {
        GroupKey(key.into())
    }

    /// Compose a key from per-column values.
    pub fn compose<S: AsRef<str>>(values: &[S]) -> Self {
        let mut key = String::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(value.as_ref());
        }
        GroupKey(key)
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Separators are control characters; show them readably.
        for c in self.0.chars() {
            if c == KEY_SEPARATOR {
                f.write_str(" / ")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        GroupKey(s.to_string())
    }
}

/// Statistics about the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of real group nodes
    pub node_count: usize,

    /// Number of distinct items in the reverse index
    pub item_count: usize,

    /// Number of batches folded into the index
    pub batches_applied: u64,

    /// Number of full resets performed
    pub resets: u64,

    /// When a batch was last applied
    pub last_applied: Option<DateTime<Utc>>,
}
