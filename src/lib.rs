// Core layer - shared types and configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure
pub mod database;

// Application layer
pub mod command_handler;
pub mod session;

pub use core::{AssistantError, AssistantResult, Config};

pub use command_handler::{CommandHandler, Reply};
pub use session::Session;

pub use features::{
    // Audio
    AudioClip, AudioTranscriber, Transcriber,
    // LLM
    ChatMessage, ChatModel, ChatRole, OpenAiChatModel,
    // Memory
    EventKind, EventLog, MemoryHit, SummaryStore,
    // Personas
    Persona, PromptBuilder,
    // Reminders
    Alert, ReminderPolicy, ReminderScheduler,
    // Router
    Action, RouteDecision, RouteSource,
    // Search
    TavilySearch, WebSearch,
    // Tasks
    JsonTaskStore, SqliteTaskStore, Task, TaskStatus, TaskStore,
};
