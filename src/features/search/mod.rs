//! # Search Feature
//!
//! Web search for questions that need current data.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: true

pub mod tavily;

pub use tavily::{render_results, SearchHit, TavilySearch, WebSearch};
