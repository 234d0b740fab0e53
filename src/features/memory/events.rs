//! Append-only event log with full-text recall
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Query terms are quoted and OR-ed so free chat text is a valid FTS5 query
//! - 1.0.0: Initial release with LIKE fallback

use log::{debug, warn};
use sqlite::State;

use crate::core::time::{Clock, EVENT_FORMAT};
use crate::core::AssistantResult;
use crate::database::Database;

/// Default number of snippets pulled into a chat prompt
pub const DEFAULT_RECALL_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ChatUser,
    ChatAssistant,
    Alert,
    TaskCreate,
    TaskDone,
    TaskSnooze,
    TaskSilence,
    WebSearch,
    Transcription,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ChatUser => "chat_user",
            EventKind::ChatAssistant => "chat_assistant",
            EventKind::Alert => "alert",
            EventKind::TaskCreate => "task_create",
            EventKind::TaskDone => "task_done",
            EventKind::TaskSnooze => "task_snooze",
            EventKind::TaskSilence => "task_silence",
            EventKind::WebSearch => "web_search",
            EventKind::Transcription => "transcription",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryHit {
    pub ts: String,
    pub kind: String,
    pub content: String,
}

#[derive(Clone)]
pub struct EventLog {
    database: Database,
    clock: Clock,
}

/// Quote every word so punctuation in chat text can't break FTS5 syntax
fn fts_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| format!("\"{}\"", w.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl EventLog {
    pub fn new(database: Database, clock: Clock) -> Self {
        EventLog { database, clock }
    }

    /// Store an event; blank content is ignored
    pub async fn append(&self, kind: EventKind, content: &str, meta: &str) -> AssistantResult<()> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }
        let ts = self.clock.now().format(EVENT_FORMAT).to_string();
        let connection = self.database.connection().await;
        let mut stmt =
            connection.prepare("INSERT INTO events (ts, kind, content, meta) VALUES (?, ?, ?, ?)")?;
        stmt.bind((1, ts.as_str()))?;
        stmt.bind((2, kind.as_str()))?;
        stmt.bind((3, content))?;
        stmt.bind((4, meta))?;
        while stmt.next()? != State::Done {}
        debug!("Logged {} event", kind.as_str());
        Ok(())
    }

    /// Fire-and-forget variant for call sites where the log is secondary
    pub async fn record(&self, kind: EventKind, content: &str) {
        if let Err(e) = self.append(kind, content, "").await {
            warn!("Failed to log {} event: {e}", kind.as_str());
        }
    }

    /// Ranked full-text search, falling back to a newest-first LIKE scan
    pub async fn search(&self, query: &str, limit: usize) -> AssistantResult<Vec<MemoryHit>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        if self.database.fts_enabled() {
            if let Some(expr) = fts_expression(query) {
                match self.search_fts(&expr, limit).await {
                    Ok(hits) => return Ok(hits),
                    Err(e) => {
                        warn!("FTS query failed, falling back to LIKE: {e}");
                    }
                }
            }
        }
        self.search_like(query, limit).await
    }

    async fn search_fts(&self, expr: &str, limit: usize) -> AssistantResult<Vec<MemoryHit>> {
        let connection = self.database.connection().await;
        let mut stmt = connection.prepare(
            "SELECT e.ts AS ts, e.kind AS kind, e.content AS content
             FROM events_fts f JOIN events e ON e.id = f.rowid
             WHERE events_fts MATCH ? ORDER BY rank LIMIT ?",
        )?;
        stmt.bind((1, expr))?;
        stmt.bind((2, limit as i64))?;
        Self::collect(&mut stmt)
    }

    async fn search_like(&self, query: &str, limit: usize) -> AssistantResult<Vec<MemoryHit>> {
        let pattern = format!("%{query}%");
        let connection = self.database.connection().await;
        let mut stmt = connection.prepare(
            "SELECT ts, kind, content FROM events WHERE content LIKE ? ORDER BY id DESC LIMIT ?",
        )?;
        stmt.bind((1, pattern.as_str()))?;
        stmt.bind((2, limit as i64))?;
        Self::collect(&mut stmt)
    }

    pub async fn recent(&self, limit: usize) -> AssistantResult<Vec<MemoryHit>> {
        let connection = self.database.connection().await;
        let mut stmt =
            connection.prepare("SELECT ts, kind, content FROM events ORDER BY id DESC LIMIT ?")?;
        stmt.bind((1, limit as i64))?;
        Self::collect(&mut stmt)
    }

    fn collect(stmt: &mut sqlite::Statement<'_>) -> AssistantResult<Vec<MemoryHit>> {
        let mut hits = Vec::new();
        while stmt.next()? == State::Row {
            hits.push(MemoryHit {
                ts: stmt.read::<String, _>("ts")?,
                kind: stmt.read::<String, _>("kind")?,
                content: stmt.read::<String, _>("content")?,
            });
        }
        Ok(hits)
    }
}
