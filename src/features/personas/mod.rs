//! # Personas Feature
//!
//! Assistant persona and prompt assembly.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: YAML persona overrides
//! - 1.0.0: Initial release

pub mod manager;
pub mod prompt_builder;

pub use manager::Persona;
pub use prompt_builder::{web_answer_prompt, PromptBuilder};
