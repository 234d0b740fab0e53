//! # Embedded Database
//!
//! Single SQLite file holding the task table and the append-only event log
//! (with its best-effort FTS5 mirror). Every feature shares one connection
//! behind an async mutex; statements never live across an await point.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Tasks moved from whole-file JSON into a per-record table
//! - 1.0.0: Event log with full-text index

use log::{debug, info, warn};
use sqlite::{Connection, ConnectionThreadSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::core::AssistantResult;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        description TEXT NOT NULL,
        due_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        remind_count INTEGER NOT NULL DEFAULT 0,
        next_remind_at TEXT NOT NULL,
        snoozed_until TEXT,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        meta TEXT
    );
";

const FTS_SCHEMA: &str = "
    CREATE VIRTUAL TABLE IF NOT EXISTS events_fts
        USING fts5(content, content='events', content_rowid='id');
    CREATE TRIGGER IF NOT EXISTS events_ai AFTER INSERT ON events
    BEGIN
        INSERT INTO events_fts(rowid, content) VALUES (new.id, new.content);
    END;
";

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<ConnectionThreadSafe>>,
    fts_enabled: Arc<AtomicBool>,
}

impl Database {
    /// Open (or create) the database file and apply the schema
    pub async fn new(path: &str) -> AssistantResult<Self> {
        info!("Opening database at {path}");
        let connection = Connection::open_thread_safe(path)?;
        Self::from_connection(connection, path != ":memory:")
    }

    /// Fresh private in-memory database
    pub async fn in_memory() -> AssistantResult<Self> {
        let connection = Connection::open_thread_safe(":memory:")?;
        Self::from_connection(connection, false)
    }

    fn from_connection(connection: ConnectionThreadSafe, wal: bool) -> AssistantResult<Self> {
        if wal {
            // WAL lets a second session read while the scheduler writes
            connection.execute("PRAGMA journal_mode=WAL;")?;
        }
        connection.execute(SCHEMA)?;

        let fts_enabled = match connection.execute(FTS_SCHEMA) {
            Ok(()) => true,
            Err(e) => {
                warn!("Full-text index unavailable, memory search will use LIKE: {e}");
                false
            }
        };
        debug!("Database schema ready (fts: {fts_enabled})");

        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
            fts_enabled: Arc::new(AtomicBool::new(fts_enabled)),
        })
    }

    pub async fn connection(&self) -> MutexGuard<'_, ConnectionThreadSafe> {
        self.connection.lock().await
    }

    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled.load(Ordering::Relaxed)
    }

    /// Stop using the FTS index after a failed query
    pub fn disable_fts(&self) {
        if self.fts_enabled.swap(false, Ordering::Relaxed) {
            warn!("Disabling full-text memory search after query failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlite::State;

    #[tokio::test]
    async fn test_schema_created() {
        let db = Database::in_memory().await.unwrap();
        let conn = db.connection().await;
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('tasks', 'events') ORDER BY name")
            .unwrap();
        let mut names = Vec::new();
        while let Ok(State::Row) = stmt.next() {
            names.push(stmt.read::<String, _>("name").unwrap());
        }
        assert_eq!(names, vec!["events".to_string(), "tasks".to_string()]);
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let conn = db.connection().await;
        conn.execute(SCHEMA).unwrap();
    }
}
