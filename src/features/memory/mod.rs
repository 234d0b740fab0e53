//! # Memory Feature
//!
//! Long-term memory: an append-only event log searchable by full text, and a
//! short "living summary" file kept up to date by the model.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod events;
pub mod summary;

pub use events::{EventKind, EventLog, MemoryHit, DEFAULT_RECALL_LIMIT};
pub use summary::{SummaryStore, EMPTY_SUMMARY};
