//! # Core Module
//!
//! Configuration, error types, time helpers and reply utilities shared by every feature.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Add typed AssistantError
//! - 1.1.0: Add time module with fixed-offset clock and quiet hours
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;
pub mod response;
pub mod time;

pub use config::{Config, TaskBackend};
pub use error::{AssistantError, AssistantResult};
pub use response::{non_blank, preview, truncate_chars};
pub use time::{format_minute, parse_minute, roll_forward, Clock, QuietHours};
