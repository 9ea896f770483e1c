//! # Sift Core Library
//!
//! This crate maintains a grouped, incrementally updated view over a
//! collection of tagged items, such as the "artists" or "genres" pane of a
//! media library browser. Grouping is computed on a background thread and
//! folded into the index in batches, so a large library can be re-grouped
//! without blocking readers.
//!
//! ## Architecture
//!
//! - **Types** (`types`): Items, columns and group keys
//! - **Extract** (`extract`): Pluggable key extraction from items
//! - **Computer** (`computer`): Pure computation of group keys for a set of items
//! - **Scheduler** (`scheduler`): Single worker thread with supersession and coalescing
//! - **Engine** (`engine`): The index itself and its batch apply protocol
//! - **Notifier** (`notifier`): Row and data change events for views
//! - **Node** (`node`): Group nodes and the summary row
//! - **Query** (`query`): Filtering nodes by display value
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use sift_core::{Column, Config, IndexEngine, Item};
//! use std::time::Duration;
//!
//! let mut engine = IndexEngine::from_config(&Config::default())?;
//! engine.reset(
//!     vec![Column::new("genre", "Genre")],
//!     vec![Item::new(1).with_field("genre", "Jazz")],
//! );
//! engine.wait_idle(Duration::from_secs(1));
//!
//! for node in engine.nodes() {
//!     println!("{} ({})", node.column(0), node.member_count());
//! }
//! ```

pub mod computer;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod node;
pub mod notifier;
pub mod query;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use computer::{GroupComputer, PendingBatch, PendingGroup};
pub use config::Config;
pub use engine::{EngineOptions, EnginePhase, IndexEngine, ItemSink, RowNode, SharedEngine};
pub use error::{Result, SiftError};
pub use extract::{FieldExtractor, KeyExtractor};
pub use node::{GroupNode, SummaryNode};
pub use notifier::{
    ChangedField, ChannelObserver, IndexEvent, IndexObserver, NodeRef, RecordingObserver,
};
pub use query::{parse_query, NodeFilter, NodeQuery};
pub use scheduler::{JobKind, Ticket};
pub use types::{Column, GroupKey, IndexStats, Item, ItemId};
