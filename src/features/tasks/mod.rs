//! # Tasks Feature
//!
//! Task records, free-text parsing and persistence backends.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: SQLite per-record store
//! - 1.0.0: Initial release

pub mod model;
pub mod parser;
pub mod store;

pub use model::{DecodedTasks, Task, TaskStatus};
pub use parser::{extract_task, TaskDraft, TimeSource};
pub use store::{import_legacy_json, JsonTaskStore, SqliteTaskStore, TaskStore};
