//! # LLM Feature
//!
//! Chat completion access behind the `ChatModel` trait.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod client;

pub use client::{ChatMessage, ChatModel, ChatRole, OpenAiChatModel};
