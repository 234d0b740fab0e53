//! Environment-driven configuration
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Task store backend selection (sqlite/json)
//! - 1.1.0: Configurable reminder schedule and quiet hours
//! - 1.0.0: Initial release

use anyhow::Result;
use std::env;

use super::time::{Clock, QuietHours, DEFAULT_UTC_OFFSET_HOURS};

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1/";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3";
pub const DEFAULT_SCHEDULE: [i64; 4] = [0, 10, 30, 120];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBackend {
    Sqlite,
    Json,
}

impl TaskBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" | "db" => Ok(TaskBackend::Sqlite),
            "json" | "file" => Ok(TaskBackend::Json),
            other => Err(anyhow::anyhow!("Unknown TASK_STORE backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub transcription_model: String,
    pub transcription_language: String,
    pub tavily_api_key: Option<String>,
    pub database_path: String,
    pub task_backend: TaskBackend,
    pub tasks_path: String,
    pub summary_path: String,
    pub persona_config_path: String,
    pub utc_offset_hours: i32,
    pub quiet_hours: QuietHours,
    pub reminder_schedule: Vec<i64>,
    pub default_task_hour: u32,
    pub poll_interval_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let llm_api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("GROQ_API_KEY"))
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                anyhow::anyhow!("LLM_API_KEY (or GROQ_API_KEY / OPENAI_API_KEY) must be set")
            })?;

        let mut llm_base_url =
            env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string());
        if !llm_base_url.ends_with('/') {
            llm_base_url.push('/');
        }

        let reminder_schedule = match env::var("REMINDER_SCHEDULE") {
            Ok(raw) => parse_schedule(&raw)?,
            Err(_) => DEFAULT_SCHEDULE.to_vec(),
        };

        Ok(Config {
            llm_api_key,
            llm_base_url,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            transcription_model: env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            transcription_language: env::var("TRANSCRIPTION_LANGUAGE")
                .unwrap_or_else(|_| "pt".to_string()),
            tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "zoe_memory.db".to_string()),
            task_backend: TaskBackend::parse(
                &env::var("TASK_STORE").unwrap_or_else(|_| "sqlite".to_string()),
            )?,
            tasks_path: env::var("TASKS_PATH").unwrap_or_else(|_| "tarefas.json".to_string()),
            summary_path: env::var("SUMMARY_PATH").unwrap_or_else(|_| "summary.txt".to_string()),
            persona_config_path: env::var("PERSONA_CONFIG_PATH")
                .unwrap_or_else(|_| "persona.yaml".to_string()),
            utc_offset_hours: env_number("UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS)?,
            quiet_hours: QuietHours::new(env_number("QUIET_START", 22)?, env_number("QUIET_END", 7)?),
            reminder_schedule,
            default_task_hour: env_number::<u32>("DEFAULT_TASK_HOUR", 9)?.min(23),
            poll_interval_secs: env_number::<u64>("POLL_INTERVAL_SECS", 10)?.max(1),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn clock(&self) -> Clock {
        Clock::from_offset_hours(self.utc_offset_hours)
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a number, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Parse "0,10,30,120" into escalation offsets in minutes
pub fn parse_schedule(raw: &str) -> Result<Vec<i64>> {
    let schedule = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid REMINDER_SCHEDULE entry: '{}'", s))
        })
        .collect::<Result<Vec<_>>>()?;

    if schedule.is_empty() {
        return Err(anyhow::anyhow!("REMINDER_SCHEDULE must not be empty"));
    }
    if schedule.iter().any(|m| *m < 0) {
        return Err(anyhow::anyhow!("REMINDER_SCHEDULE entries must be >= 0"));
    }
    Ok(schedule)
}
