//! Key extraction.
//!
//! A [`KeyExtractor`] turns `(item, column)` into the display value the item
//! is grouped under. The index never interprets the value beyond splitting it
//! on [`MULTI_VALUE_SEPARATOR`]; what a column *means* is entirely up to the
//! extractor.
//!
//! Extractors run on the scheduler's worker thread, so they must be
//! `Send + Sync` and free of side effects.

use crate::types::{strip_separators, Column, Item, KEY_SEPARATOR, MULTI_VALUE_SEPARATOR};

/// Pure function from an item and a column to a display value.
///
/// Implementations must be deterministic: the same item and column always
/// yield the same value. A value may hold several entries separated by
/// [`MULTI_VALUE_SEPARATOR`], in which case the item joins one group per entry.
pub trait KeyExtractor: Send + Sync {
    /// Extract the display value of `column` for `item`.
    fn extract(&self, item: &Item, column: &Column) -> String;
}

impl<F> KeyExtractor for F
where
    F: Fn(&Item, &Column) -> String + Send + Sync,
{
    fn extract(&self, item: &Item, column: &Column) -> String {
        self(item, column)
    }
}

/// Reads `column.field` straight from the item's tag map.
///
/// Missing fields extract as an empty string and separator characters in the
/// raw tag text are dropped. When a split delimiter is set,
/// occurrences of it are treated as multi-value boundaries, so
/// `"Rock; Jazz"` with delimiter `";"` groups under both `Rock` and `Jazz`.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    split_on: Option<String>,
}

impl FieldExtractor {
    /// Create an extractor that never splits values
    pub fn new() -> Self {
        FieldExtractor { split_on: None }
    }

    /// Treat `delimiter` as a multi-value separator.
    ///
    /// An empty delimiter disables splitting.
    pub fn with_split(mut self, delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        self.split_on = if delimiter.is_empty() {
            None
        } else {
            Some(delimiter)
        };
        self
    }
}

impl KeyExtractor for FieldExtractor {
    fn extract(&self, item: &Item, column: &Column) -> String {
        let raw = strip_separators(item.field(&column.field).unwrap_or_default());

        match &self.split_on {
            Some(delimiter) if raw.contains(delimiter.as_str()) => {
                let separator = MULTI_VALUE_SEPARATOR.to_string();
                raw.split(delimiter.as_str())
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(separator.as_str())
            }
            _ => raw.trim().to_string(),
        }
    }
}

/// Split an extracted value into its individual entries.
///
/// Always yields at least one entry so that an item with an empty value
/// still lands in exactly one group.
pub(crate) fn split_values(value: &str) -> Vec<String> {
    let parts: Vec<String> = value
        .split(MULTI_VALUE_SEPARATOR)
        .map(|part| part.replace(KEY_SEPARATOR, ""))
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        vec![String::new()]
    } else {
        // Duplicate entries in one value must not double-count the item.
        let mut deduped = Vec::with_capacity(parts.len());
        for part in parts {
            if !deduped.contains(&part) {
                deduped.push(part);
            }
        }
        deduped
    }
}
