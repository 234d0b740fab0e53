//! # Reminders Feature
//!
//! Escalating task reminders with quiet hours.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

pub mod scheduler;

pub use scheduler::{due_tasks, pick_due_task, schedule_next, Alert, ReminderPolicy, ReminderScheduler};
