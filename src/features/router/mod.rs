//! # Router Feature
//!
//! Classifies user input into an [`Action`]: deterministic rules first, the
//! language model only when no rule matches.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Snooze/silence actions and task target resolution
//! - 1.1.0: Fallback reason carried on the decision
//! - 1.0.0: Initial release

pub mod model;
pub mod rules;

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::{AssistantError, AssistantResult};
use crate::features::llm::ChatModel;
use crate::features::tasks::parser::clean_text;
use crate::features::tasks::{Task, TaskDraft};

pub use model::{extract_json, extract_task_with_model, parse_route, route_with_model};
pub use rules::{match_rules, DEFAULT_SNOOZE_MINUTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    TaskCreate,
    TaskDone,
    TaskSnooze,
    TaskSilence,
    WebSearch,
    Chat,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::TaskCreate => "TASK_CREATE",
            Action::TaskDone => "TASK_DONE",
            Action::TaskSnooze => "TASK_SNOOZE",
            Action::TaskSilence => "TASK_SILENCE",
            Action::WebSearch => "WEB_SEARCH",
            Action::Chat => "CHAT",
        }
    }

    /// Case-insensitive wire name lookup
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TASK_CREATE" => Some(Action::TaskCreate),
            "TASK_DONE" => Some(Action::TaskDone),
            "TASK_SNOOZE" => Some(Action::TaskSnooze),
            "TASK_SILENCE" => Some(Action::TaskSilence),
            "WEB_SEARCH" => Some(Action::WebSearch),
            "CHAT" => Some(Action::Chat),
            _ => None,
        }
    }
}

/// Why the router picked its action
#[derive(Debug)]
pub enum RouteSource {
    /// Named deterministic rule
    Rule(&'static str),
    Model,
    /// Model unreachable or unreadable; defaulted to chat
    Fallback(AssistantError),
}

#[derive(Debug)]
pub struct RouteDecision {
    pub action: Action,
    /// Position in the task list shown to the model
    pub task_index: Option<usize>,
    pub minutes: Option<i64>,
    pub search_query: Option<String>,
    /// Task parsed locally by a reminder rule
    pub draft: Option<TaskDraft>,
    pub source: RouteSource,
}

impl RouteDecision {
    pub fn new(action: Action, source: RouteSource) -> Self {
        RouteDecision {
            action,
            task_index: None,
            minutes: None,
            search_query: None,
            draft: None,
            source,
        }
    }
}

/// Route `text` against the current task list
pub async fn route(
    text: &str,
    tasks: &[Task],
    model: &dyn ChatModel,
    now: NaiveDateTime,
    default_hour: u32,
) -> RouteDecision {
    if let Some(decision) = match_rules(text, now, default_hour) {
        if let RouteSource::Rule(name) = &decision.source {
            debug!("Rule '{name}' routed to {}", decision.action.as_str());
        }
        return decision;
    }
    route_with_model(model, text, tasks, now).await
}

fn words(text: &str) -> HashSet<String> {
    clean_text(text)
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Task a done/snooze/silence decision refers to.
///
/// An explicit valid index wins, then the task sharing the most words with the
/// text, then the most overdue (earliest due) task.
pub fn resolve_target<'a>(
    decision: &RouteDecision,
    text: &str,
    tasks: &'a [Task],
) -> AssistantResult<&'a Task> {
    if tasks.is_empty() {
        return Err(AssistantError::NoMatchingTask);
    }

    if let Some(task) = decision.task_index.and_then(|i| tasks.get(i)) {
        return Ok(task);
    }

    let said = words(text);
    let best = tasks
        .iter()
        .map(|t| (words(&t.description).intersection(&said).count(), t))
        .filter(|(overlap, _)| *overlap > 0)
        .max_by(|(a, ta), (b, tb)| a.cmp(b).then_with(|| tb.due_at.cmp(&ta.due_at)));
    if let Some((_, task)) = best {
        return Ok(task);
    }

    tasks
        .iter()
        .min_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)))
        .ok_or(AssistantError::NoMatchingTask)
}
