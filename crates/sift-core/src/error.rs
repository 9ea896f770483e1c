//! Error types for Sift core operations.
//!
//! Grouping itself is infallible: the index is a derived cache and tolerates
//! sequencing gaps from its caller. The variants here cover configuration,
//! node filtering, and invariant checks that callers may want to report.

use crate::types::{GroupKey, ItemId};
use thiserror::Error;

/// Result type alias using SiftError
pub type Result<T> = std::result::Result<T, SiftError>;

/// Core error types for Sift operations.
#[derive(Error, Debug)]
pub enum SiftError {
    // === Index Errors ===
    /// An item is recorded in the reverse index under a node that does not list it
    #[error("item {item} maps to node {key:?} which does not contain it")]
    DanglingReverseEntry { item: ItemId, key: GroupKey },

    /// A node lists an item whose reverse entry does not point back at it
    #[error("node {key:?} contains item {item} without a matching reverse entry")]
    MissingReverseEntry { item: ItemId, key: GroupKey },

    /// A node exists with no members
    #[error("node {key:?} has no members")]
    OrphanNode { key: GroupKey },

    /// Row bookkeeping disagrees with the node map
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    // === Filter Errors ===
    /// Invalid filter pattern (e.g., bad regex)
    #[error("invalid filter pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiftError {
    /// Returns true if this error means the reverse index and node membership disagree.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SiftError::DanglingReverseEntry { .. }
                | SiftError::MissingReverseEntry { .. }
                | SiftError::OrphanNode { .. }
                | SiftError::InvariantViolation(_)
        )
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        SiftError::ConfigError {
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for SiftError {
    fn from(err: toml::de::Error) -> Self {
        SiftError::ConfigError {
            reason: format!("Failed to parse config: {}", err),
        }
    }
}
