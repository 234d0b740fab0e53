//! Task record
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Accept legacy Portuguese field names when decoding
//! - 1.0.0: Initial release

use chrono::{Duration, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::time::{format_minute, parse_minute};
use crate::core::{AssistantError, AssistantResult};

/// A decoded task list plus the records that could not be read
#[derive(Debug, Default)]
pub struct DecodedTasks {
    pub tasks: Vec<Task>,
    pub unreadable: Vec<serde_json::Value>,
}

/// How far a silenced task's next reminder is pushed
pub const SILENCE_SENTINEL_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[serde(alias = "ativa")]
    Active,
    #[serde(alias = "silenciada")]
    Silenced,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Silenced => "silenced",
        }
    }

    pub fn parse(value: &str) -> AssistantResult<Self> {
        match value {
            "active" | "ativa" => Ok(TaskStatus::Active),
            "silenced" | "silenciada" => Ok(TaskStatus::Silenced),
            other => Err(AssistantError::Storage(format!("unknown task status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(with = "minute_format")]
    pub due_at: NaiveDateTime,
    pub status: TaskStatus,
    pub remind_count: u32,
    #[serde(with = "minute_format")]
    pub next_remind_at: NaiveDateTime,
    #[serde(with = "minute_format::option", default)]
    pub snoozed_until: Option<NaiveDateTime>,
    #[serde(with = "minute_format")]
    pub created_at: NaiveDateTime,
}

/// Loose on-disk shape: every field except the description and due time may be missing
#[derive(Debug, Deserialize)]
struct RawTask {
    id: Option<String>,
    #[serde(alias = "descricao")]
    description: String,
    #[serde(alias = "data_hora")]
    due_at: String,
    status: Option<String>,
    remind_count: Option<u32>,
    next_remind_at: Option<String>,
    snoozed_until: Option<String>,
    created_at: Option<String>,
}

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

impl Task {
    pub fn new(description: impl Into<String>, due_at: NaiveDateTime, now: NaiveDateTime) -> Self {
        Task {
            id: new_task_id(),
            description: description.into(),
            due_at,
            status: TaskStatus::Active,
            remind_count: 0,
            next_remind_at: due_at,
            snoozed_until: None,
            created_at: now,
        }
    }

    /// Decode one stored record, filling defaults for missing fields
    pub fn from_value(value: serde_json::Value, now: NaiveDateTime) -> AssistantResult<Self> {
        let raw: RawTask = serde_json::from_value(value)?;
        let due_at = parse_minute(&raw.due_at)?;
        let next_remind_at = match raw.next_remind_at.as_deref() {
            Some(s) if !s.trim().is_empty() => parse_minute(s)?,
            _ => due_at,
        };
        let snoozed_until = match raw.snoozed_until.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(parse_minute(s)?),
            _ => None,
        };
        let created_at = match raw.created_at.as_deref() {
            Some(s) => parse_minute(s).unwrap_or(now),
            None => now,
        };
        let status = match raw.status.as_deref() {
            Some(s) => TaskStatus::parse(s)?,
            None => TaskStatus::Active,
        };

        Ok(Task {
            id: raw.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(new_task_id),
            description: raw.description,
            due_at,
            status,
            remind_count: raw.remind_count.unwrap_or(0),
            next_remind_at,
            snoozed_until,
            created_at,
        })
    }

    /// Decode a list. Records that fail to parse are logged and kept raw.
    pub fn decode_all(values: Vec<serde_json::Value>, now: NaiveDateTime) -> DecodedTasks {
        let mut decoded = DecodedTasks::default();
        for value in values {
            match Task::from_value(value.clone(), now) {
                Ok(task) => decoded.tasks.push(task),
                Err(e) => {
                    warn!("Skipping unreadable task record: {e}");
                    decoded.unreadable.push(value);
                }
            }
        }
        decoded
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }

    /// When the next proactive reminder may fire; a snooze can only postpone it
    pub fn effective_next_remind(&self) -> NaiveDateTime {
        match self.snoozed_until {
            Some(until) if until > self.next_remind_at => until,
            _ => self.next_remind_at,
        }
    }

    pub fn silence(&mut self, now: NaiveDateTime) {
        self.status = TaskStatus::Silenced;
        self.snoozed_until = None;
        self.next_remind_at = now + Duration::days(SILENCE_SENTINEL_DAYS);
    }

    /// Postpone the next reminder and restart the escalation
    pub fn snooze(&mut self, now: NaiveDateTime, minutes: i64) {
        let until = now + Duration::minutes(minutes.max(1));
        self.status = TaskStatus::Active;
        self.next_remind_at = until;
        self.snoozed_until = Some(until);
        self.remind_count = 0;
    }

    pub fn due_label(&self) -> String {
        format_minute(&self.due_at)
    }
}

/// serde adapter for `YYYY-MM-DD HH:MM`
pub mod minute_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::core::time::{format_minute, parse_minute};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_minute(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_minute(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_str(&format_minute(dt)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            match raw {
                Some(s) if !s.trim().is_empty() => {
                    parse_minute(&s).map(Some).map_err(serde::de::Error::custom)
                }
                _ => Ok(None),
            }
        }
    }
}
