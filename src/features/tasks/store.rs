//! Task persistence
//!
//! Two backends behind one trait:
//! - [`SqliteTaskStore`]: one row per task, every mutation touches only its row.
//! - [`JsonTaskStore`]: legacy flat JSON array, rewritten through a temp file
//!   and rename. Read-modify-write is serialized inside the process only.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Per-record SQLite store, JSON kept as alternative backend and import source
//! - 1.1.0: Write-temp-then-rename for the JSON file
//! - 1.0.0: Whole-file JSON store

use async_trait::async_trait;
use log::{debug, info, warn};
use sqlite::State;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::model::{DecodedTasks, Task, TaskStatus};
use crate::core::time::{format_minute, parse_minute, Clock, DEFAULT_UTC_OFFSET_HOURS};
use crate::core::{AssistantError, AssistantResult};
use crate::database::Database;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All readable tasks, ordered by due time
    async fn list(&self) -> AssistantResult<Vec<Task>>;

    async fn get(&self, id: &str) -> AssistantResult<Option<Task>>;

    async fn insert(&self, task: &Task) -> AssistantResult<()>;

    /// Overwrite a single task; `NoMatchingTask` if it no longer exists
    async fn update(&self, task: &Task) -> AssistantResult<()>;

    /// Delete a task, returning whether anything was removed
    async fn remove(&self, id: &str) -> AssistantResult<bool>;

    async fn replace_all(&self, tasks: &[Task]) -> AssistantResult<()>;
}

fn sort_by_due(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const SELECT_COLUMNS: &str =
    "SELECT id, description, due_at, status, remind_count, next_remind_at, snoozed_until, created_at FROM tasks";

const UPSERT: &str = "INSERT INTO tasks (id, description, due_at, status, remind_count, next_remind_at, snoozed_until, created_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
        description = excluded.description,
        due_at = excluded.due_at,
        status = excluded.status,
        remind_count = excluded.remind_count,
        next_remind_at = excluded.next_remind_at,
        snoozed_until = excluded.snoozed_until,
        created_at = excluded.created_at";

#[derive(Clone)]
pub struct SqliteTaskStore {
    database: Database,
}

impl SqliteTaskStore {
    pub fn new(database: Database) -> Self {
        SqliteTaskStore { database }
    }

    fn read_row(stmt: &sqlite::Statement<'_>) -> AssistantResult<Task> {
        let snoozed = stmt.read::<Option<String>, _>("snoozed_until")?;
        let created_raw = stmt.read::<String, _>("created_at")?;
        let due_at = parse_minute(&stmt.read::<String, _>("due_at")?)?;
        Ok(Task {
            id: stmt.read::<String, _>("id")?,
            description: stmt.read::<String, _>("description")?,
            due_at,
            status: TaskStatus::parse(&stmt.read::<String, _>("status")?)?,
            remind_count: stmt.read::<i64, _>("remind_count")?.max(0) as u32,
            next_remind_at: parse_minute(&stmt.read::<String, _>("next_remind_at")?)?,
            snoozed_until: match snoozed {
                Some(s) if !s.is_empty() => Some(parse_minute(&s)?),
                _ => None,
            },
            created_at: parse_minute(&created_raw).unwrap_or(due_at),
        })
    }

    fn write_row(connection: &sqlite::Connection, task: &Task) -> AssistantResult<()> {
        let due = format_minute(&task.due_at);
        let next = format_minute(&task.next_remind_at);
        let snoozed = task.snoozed_until.as_ref().map(format_minute);
        let created = format_minute(&task.created_at);

        let mut stmt = connection.prepare(UPSERT)?;
        stmt.bind((1, task.id.as_str()))?;
        stmt.bind((2, task.description.as_str()))?;
        stmt.bind((3, due.as_str()))?;
        stmt.bind((4, task.status.as_str()))?;
        stmt.bind((5, task.remind_count as i64))?;
        stmt.bind((6, next.as_str()))?;
        stmt.bind((7, snoozed.as_deref()))?;
        stmt.bind((8, created.as_str()))?;
        while stmt.next()? != State::Done {}
        Ok(())
    }

    pub async fn count(&self) -> AssistantResult<usize> {
        let connection = self.database.connection().await;
        let mut stmt = connection.prepare("SELECT COUNT(*) AS n FROM tasks")?;
        let mut n = 0;
        if stmt.next()? == State::Row {
            n = stmt.read::<i64, _>("n")?.max(0) as usize;
        }
        Ok(n)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list(&self) -> AssistantResult<Vec<Task>> {
        let connection = self.database.connection().await;
        let mut stmt = connection.prepare(format!("{SELECT_COLUMNS} ORDER BY due_at, id"))?;
        let mut tasks = Vec::new();
        while stmt.next()? == State::Row {
            match Self::read_row(&stmt) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!("Skipping unreadable task row: {e}"),
            }
        }
        Ok(tasks)
    }

    async fn get(&self, id: &str) -> AssistantResult<Option<Task>> {
        let connection = self.database.connection().await;
        let mut stmt = connection.prepare(format!("{SELECT_COLUMNS} WHERE id = ?"))?;
        stmt.bind((1, id))?;
        if stmt.next()? == State::Row {
            return Self::read_row(&stmt).map(Some);
        }
        Ok(None)
    }

    async fn insert(&self, task: &Task) -> AssistantResult<()> {
        let connection = self.database.connection().await;
        Self::write_row(&connection, task)?;
        debug!("Inserted task {} due {}", task.id, task.due_label());
        Ok(())
    }

    async fn update(&self, task: &Task) -> AssistantResult<()> {
        let connection = self.database.connection().await;
        let mut exists = connection.prepare("SELECT 1 FROM tasks WHERE id = ?")?;
        exists.bind((1, task.id.as_str()))?;
        if exists.next()? != State::Row {
            return Err(AssistantError::NoMatchingTask);
        }
        drop(exists);
        Self::write_row(&connection, task)
    }

    async fn remove(&self, id: &str) -> AssistantResult<bool> {
        let connection = self.database.connection().await;
        let mut stmt = connection.prepare("DELETE FROM tasks WHERE id = ?")?;
        stmt.bind((1, id))?;
        while stmt.next()? != State::Done {}
        drop(stmt);
        Ok(connection.change_count() > 0)
    }

    async fn replace_all(&self, tasks: &[Task]) -> AssistantResult<()> {
        let connection = self.database.connection().await;
        connection.execute("BEGIN")?;
        let result = (|| -> AssistantResult<()> {
            connection.execute("DELETE FROM tasks")?;
            for task in tasks {
                Self::write_row(&connection, task)?;
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                connection.execute("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = connection.execute("ROLLBACK") {
                    warn!("Rollback failed after task replace error: {rollback}");
                }
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

pub struct JsonTaskStore {
    path: PathBuf,
    lock: Mutex<()>,
    /// Fills `created_at` on legacy records that lack it
    clock: Clock,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonTaskStore {
            path: path.into(),
            lock: Mutex::new(()),
            clock: Clock::from_offset_hours(DEFAULT_UTC_OFFSET_HOURS),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt file reads as an empty list
    async fn read_file(&self) -> DecodedTasks {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return DecodedTasks::default(),
            Err(e) => {
                warn!("Could not read {}: {e}", self.path.display());
                return DecodedTasks::default();
            }
        };
        match serde_json::from_str::<serde_json::Value>(&contents) {
            Ok(serde_json::Value::Array(values)) => {
                let without_id = |v: &serde_json::Value| v.get("id").is_none();
                let missing_ids = values.iter().filter(|v| without_id(*v)).count();
                let decoded = Task::decode_all(values, self.clock.now_floor_minute());
                if missing_ids > decoded.unreadable.iter().filter(|v| without_id(*v)).count() {
                    // pin generated ids so later updates can find the records
                    if let Err(e) = self.write_file(&decoded.tasks, &decoded.unreadable).await {
                        warn!("Could not normalize {}: {e}", self.path.display());
                    }
                }
                decoded
            }
            Ok(_) => {
                warn!("{} is not a JSON array; treating as empty", self.path.display());
                DecodedTasks::default()
            }
            Err(e) => {
                warn!("{} is not valid JSON ({e}); treating as empty", self.path.display());
                DecodedTasks::default()
            }
        }
    }

    /// Unreadable records are written back untouched after the tasks
    async fn write_file(&self, tasks: &[Task], unreadable: &[serde_json::Value]) -> AssistantResult<()> {
        let mut records = tasks
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        records.extend(unreadable.iter().cloned());
        let body = serde_json::to_string_pretty(&records)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn list(&self) -> AssistantResult<Vec<Task>> {
        let _guard = self.lock.lock().await;
        let mut tasks = self.read_file().await.tasks;
        sort_by_due(&mut tasks);
        Ok(tasks)
    }

    async fn get(&self, id: &str) -> AssistantResult<Option<Task>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_file().await.tasks.into_iter().find(|t| t.id == id))
    }

    async fn insert(&self, task: &Task) -> AssistantResult<()> {
        let _guard = self.lock.lock().await;
        let DecodedTasks { mut tasks, unreadable } = self.read_file().await;
        tasks.retain(|t| t.id != task.id);
        tasks.push(task.clone());
        self.write_file(&tasks, &unreadable).await
    }

    async fn update(&self, task: &Task) -> AssistantResult<()> {
        let _guard = self.lock.lock().await;
        let DecodedTasks { mut tasks, unreadable } = self.read_file().await;
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or(AssistantError::NoMatchingTask)?;
        *slot = task.clone();
        self.write_file(&tasks, &unreadable).await
    }

    async fn remove(&self, id: &str) -> AssistantResult<bool> {
        let _guard = self.lock.lock().await;
        let DecodedTasks { mut tasks, unreadable } = self.read_file().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.write_file(&tasks, &unreadable).await?;
        Ok(true)
    }

    /// Replaces every readable task; unreadable records are left in place
    async fn replace_all(&self, tasks: &[Task]) -> AssistantResult<()> {
        let _guard = self.lock.lock().await;
        let unreadable = self.read_file().await.unreadable;
        self.write_file(tasks, &unreadable).await
    }
}

/// Copy a legacy JSON task file into `store` when the store is still empty.
/// Returns the number of imported tasks.
pub async fn import_legacy_json(
    path: &str,
    store: &SqliteTaskStore,
    clock: Clock,
) -> AssistantResult<usize> {
    if !Path::new(path).exists() {
        return Ok(0);
    }
    if store.count().await? > 0 {
        debug!("Task table already populated; skipping import of {path}");
        return Ok(0);
    }

    let tasks = JsonTaskStore::new(path).with_clock(clock).list().await?;
    for task in &tasks {
        store.insert(task).await?;
    }
    if !tasks.is_empty() {
        info!("Imported {} task(s) from legacy file {path}", tasks.len());
    }
    Ok(tasks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        parse_minute(s).unwrap()
    }

    fn scratch_path(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        (dir, path)
    }

    fn sample(desc: &str, due: &str) -> Task {
        Task::new(desc, at(due), at("2026-10-17 08:00"))
    }

    async fn exercise_store(store: &dyn TaskStore) {
        let a = sample("late", "2026-10-17 19:00");
        let b = sample("early", "2026-10-17 09:00");
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].description, "early");

        let mut changed = a.clone();
        changed.remind_count = 2;
        changed.snoozed_until = Some(at("2026-10-17 19:30"));
        store.update(&changed).await.unwrap();
        let fetched = store.get(&a.id).await.unwrap().unwrap();
        assert_eq!(fetched, changed);

        assert!(store.remove(&b.id).await.unwrap());
        assert!(!store.remove(&b.id).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);

        let ghost = sample("ghost", "2026-10-17 10:00");
        assert!(matches!(
            store.update(&ghost).await,
            Err(AssistantError::NoMatchingTask)
        ));

        store.replace_all(&[ghost.clone()]).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![ghost]);
    }

    #[tokio::test]
    async fn test_sqlite_store_crud() {
        let store = SqliteTaskStore::new(Database::in_memory().await.unwrap());
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_json_store_crud() {
        let (_dir, path) = scratch_path("tarefas.json");
        let store = JsonTaskStore::new(path);
        exercise_store(&store).await;
        // temp file never left behind
        let mut tmp = store.path().to_path_buf().into_os_string();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
    }

    #[tokio::test]
    async fn test_json_store_missing_and_corrupt_file() {
        let (_dir, path) = scratch_path("tarefas.json");
        let store = JsonTaskStore::new(&path);
        assert!(store.list().await.unwrap().is_empty());

        std::fs::write(&path, "{not json").unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_store_keeps_unreadable_records() {
        let (_dir, path) = scratch_path("tarefas.json");
        std::fs::write(
            &path,
            r#"[{"id": "keep0001", "descricao": "consulta médica", "data_hora": "17/10/2026 15:00"}]"#,
        )
        .unwrap();
        let store = JsonTaskStore::new(&path);
        assert!(store.list().await.unwrap().is_empty());

        let fresh = sample("nova", "2026-10-17 18:00");
        store.insert(&fresh).await.unwrap();
        store.replace_all(&[fresh.clone()]).await.unwrap();
        assert!(store.remove(&fresh.id).await.unwrap());

        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0]["id"], "keep0001");
        assert_eq!(raw[0]["descricao"], "consulta médica");
        assert_eq!(raw[0]["data_hora"], "17/10/2026 15:00");
    }

    #[tokio::test]
    async fn test_json_store_pins_ids_of_legacy_records() {
        let (_dir, path) = scratch_path("tarefas.json");
        std::fs::write(
            &path,
            r#"[{"descricao": "regar as plantas", "data_hora": "2026-10-17 18:00"}]"#,
        )
        .unwrap();
        let store = JsonTaskStore::new(&path);

        let mut task = store.list().await.unwrap().remove(0);
        assert_eq!(store.list().await.unwrap()[0].id, task.id);

        task.remind_count = 1;
        store.update(&task).await.unwrap();
        assert_eq!(store.get(&task.id).await.unwrap().unwrap().remind_count, 1);
    }

    #[tokio::test]
    async fn test_sqlite_skips_rows_with_bad_dates() {
        let db = Database::in_memory().await.unwrap();
        let store = SqliteTaskStore::new(db.clone());
        store.insert(&sample("good", "2026-10-17 09:00")).await.unwrap();
        {
            let conn = db.connection().await;
            conn.execute(
                "INSERT INTO tasks (id, description, due_at, status, remind_count, next_remind_at, created_at)
                 VALUES ('bad00000', 'bad', 'someday', 'active', 0, 'someday', 'x')",
            )
            .unwrap();
        }
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description, "good");
    }

    #[tokio::test]
    async fn test_import_legacy_json() {
        let (_dir, path) = scratch_path("tarefas.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "a1b2c3d4", "descricao": "comprar pão", "data_hora": "2026-10-17 18:00", "status": "ativa"},
                {"descricao": "data ruim", "data_hora": "ontem"}
            ]"#,
        )
        .unwrap();

        let store = SqliteTaskStore::new(Database::in_memory().await.unwrap());
        let imported = import_legacy_json(path.to_str().unwrap(), &store, Clock::from_offset_hours(-3)).await.unwrap();
        assert_eq!(imported, 1);
        let task = store.get("a1b2c3d4").await.unwrap().unwrap();
        assert_eq!(task.description, "comprar pão");

        // second run is a no-op because the table is populated
        let again = import_legacy_json(path.to_str().unwrap(), &store, Clock::from_offset_hours(-3)).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_import_records_without_ids_then_update() {
        let (_dir, path) = scratch_path("tarefas.json");
        std::fs::write(
            &path,
            r#"[
                {"descricao": "ligar pro dentista", "data_hora": "2026-10-17 14:00"},
                {"descricao": "levar o lixo", "data_hora": "2026-10-17 20:00", "status": "silenciada"}
            ]"#,
        )
        .unwrap();

        let store = SqliteTaskStore::new(Database::in_memory().await.unwrap());
        let imported = import_legacy_json(path.to_str().unwrap(), &store, Clock::from_offset_hours(-3))
            .await
            .unwrap();
        assert_eq!(imported, 2);

        let mut task = store.list().await.unwrap().remove(0);
        assert_eq!(task.description, "ligar pro dentista");
        assert_eq!(task.id.len(), 8);

        task.snooze(at("2026-10-17 14:00"), 15);
        store.update(&task).await.unwrap();
        let stored = store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.next_remind_at, at("2026-10-17 14:15"));
        assert_eq!(store.list().await.unwrap()[1].status, TaskStatus::Silenced);
    }
}
