//! Command implementations.

pub mod config;
pub mod group;
pub mod query;
pub mod replay;
