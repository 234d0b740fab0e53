//! # Features Layer
//!
//! Each feature lives in its own module with a header documenting version and
//! changelog.
//!
//! - **Version**: 0.3.0
//! - **Since**: 0.1.0

pub mod audio;
pub mod llm;
pub mod memory;
pub mod personas;
pub mod reminders;
pub mod router;
pub mod search;
pub mod tasks;

// Audio
pub use audio::{AudioClip, AudioTranscriber, Transcriber};
// LLM
pub use llm::{ChatMessage, ChatModel, ChatRole, OpenAiChatModel};
// Memory
pub use memory::{EventKind, EventLog, MemoryHit, SummaryStore};
// Personas
pub use personas::{Persona, PromptBuilder};
// Reminders
pub use reminders::{Alert, ReminderPolicy, ReminderScheduler};
// Router
pub use router::{route, Action, RouteDecision, RouteSource};
// Search
pub use search::{TavilySearch, WebSearch};
// Tasks
pub use tasks::{JsonTaskStore, SqliteTaskStore, Task, TaskStatus, TaskStore};
