//! SQLite-backed store.
//!
//! The database holds two tables:
//! - `tasks` - per-chat named tasks
//! - `pomo_history` - one row per work period
//!
//! `rusqlite` is synchronous, so every query runs on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pomo_core::{ChatId, HistoryRecord, RecordId, Task, TaskId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{HistoryStore, StoreError, TaskStore};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS tasks (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL,
        name    TEXT    NOT NULL,
        UNIQUE (chat_id, name)
    );

    CREATE TABLE IF NOT EXISTS pomo_history (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id  INTEGER NOT NULL,
        task_id  INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
        started  TEXT    NOT NULL,
        ended    TEXT,
        finished INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_pomo_history_chat ON pomo_history(chat_id);
";

/// Persistent history and task store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Opened history database");
        Self::with_connection(conn)
    }

    /// Opens a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::database)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Database(format!("Failed to create schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("Bad timestamp '{raw}': {e}")))
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn open_record(
        &self,
        chat_id: ChatId,
        task_id: Option<TaskId>,
    ) -> Result<RecordId, StoreError> {
        let started = Utc::now().to_rfc3339();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO pomo_history (chat_id, task_id, started, ended, finished)
                 VALUES (?1, ?2, ?3, NULL, 0)",
                params![chat_id.get(), task_id.map(TaskId::get), started],
            )
            .map_err(StoreError::database)?;
            Ok(RecordId::new(conn.last_insert_rowid()))
        })
        .await
    }

    async fn close_record(&self, record: RecordId) -> Result<(), StoreError> {
        let ended = Utc::now().to_rfc3339();
        self.run(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE pomo_history SET ended = ?1, finished = 1
                     WHERE id = ?2 AND finished = 0",
                    params![ended, record.get()],
                )
                .map_err(StoreError::database)?;
            if updated == 0 {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM pomo_history WHERE id = ?1",
                        params![record.get()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(StoreError::database)?;
                if exists.is_none() {
                    return Err(StoreError::RecordNotFound(record));
                }
            }
            Ok(())
        })
        .await
    }

    async fn records(&self, chat_id: ChatId) -> Result<Vec<HistoryRecord>, StoreError> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, task_id, started, ended, finished FROM pomo_history
                     WHERE chat_id = ?1 ORDER BY id",
                )
                .map_err(StoreError::database)?;
            let rows = stmt
                .query_map(params![chat_id.get()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                })
                .map_err(StoreError::database)?;

            let mut records = Vec::new();
            for row in rows {
                let (id, task_id, started, ended, finished) = row.map_err(StoreError::database)?;
                records.push(HistoryRecord {
                    id: RecordId::new(id),
                    chat_id,
                    task_id: task_id.map(TaskId::new),
                    started: parse_timestamp(&started)?,
                    ended: ended.as_deref().map(parse_timestamp).transpose()?,
                    finished,
                });
            }
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn find_task_by_name(
        &self,
        chat_id: ChatId,
        name: &str,
    ) -> Result<Option<TaskId>, StoreError> {
        let name = name.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id FROM tasks WHERE chat_id = ?1 AND name = ?2",
                params![chat_id.get(), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map(|id| id.map(TaskId::new))
            .map_err(StoreError::database)
        })
        .await
    }

    async fn list_tasks(&self, chat_id: ChatId) -> Result<Vec<Task>, StoreError> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, name FROM tasks WHERE chat_id = ?1 ORDER BY name")
                .map_err(StoreError::database)?;
            let rows = stmt
                .query_map(params![chat_id.get()], |row| {
                    Ok(Task {
                        id: TaskId::new(row.get(0)?),
                        chat_id,
                        name: row.get(1)?,
                    })
                })
                .map_err(StoreError::database)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::database)
        })
        .await
    }

    async fn add_task(&self, chat_id: ChatId, name: &str) -> Result<Task, StoreError> {
        let name = name.to_string();
        self.run(move |conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO tasks (chat_id, name) VALUES (?1, ?2)",
                    params![chat_id.get(), name],
                )
                .map_err(StoreError::database)?;
            if inserted == 0 {
                return Err(StoreError::DuplicateTask(name));
            }
            Ok(Task {
                id: TaskId::new(conn.last_insert_rowid()),
                chat_id,
                name,
            })
        })
        .await
    }

    async fn delete_task(&self, chat_id: ChatId, name: &str) -> Result<bool, StoreError> {
        let name = name.to_string();
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM tasks WHERE chat_id = ?1 AND name = ?2",
                params![chat_id.get(), name],
            )
            .map(|deleted| deleted > 0)
            .map_err(StoreError::database)
        })
        .await
    }
}
