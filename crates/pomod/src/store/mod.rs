//! History and task store capabilities.
//!
//! The scheduler only needs to open and close work records and to resolve
//! task names. Two implementations ship with the daemon:
//! - [`InMemoryStore`] - process-lifetime storage, used by tests and
//!   `database_path = ":memory:"`
//! - [`SqliteStore`] - persistent storage in a single SQLite file

use async_trait::async_trait;
use pomo_core::{ChatId, HistoryRecord, RecordId, Task, TaskId};
use thiserror::Error;

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Persists one record per work period.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Opens an unfinished record for a work period starting now.
    async fn open_record(
        &self,
        chat_id: ChatId,
        task_id: Option<TaskId>,
    ) -> Result<RecordId, StoreError>;

    /// Marks a record finished.
    async fn close_record(&self, record: RecordId) -> Result<(), StoreError>;

    /// All records of a chat, oldest first.
    async fn records(&self, chat_id: ChatId) -> Result<Vec<HistoryRecord>, StoreError>;
}

/// Per-chat named tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_task_by_name(
        &self,
        chat_id: ChatId,
        name: &str,
    ) -> Result<Option<TaskId>, StoreError>;

    /// Tasks of a chat ordered by name.
    async fn list_tasks(&self, chat_id: ChatId) -> Result<Vec<Task>, StoreError>;

    /// # Errors
    ///
    /// `StoreError::DuplicateTask` if the chat already has a task of that name.
    async fn add_task(&self, chat_id: ChatId, name: &str) -> Result<Task, StoreError>;

    /// Returns whether a task was deleted.
    async fn delete_task(&self, chat_id: ChatId, name: &str) -> Result<bool, StoreError>;
}

/// Errors that can occur in store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("history record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("task already exists: {0}")]
    DuplicateTask(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("store worker failed: {0}")]
    Worker(String),
}

impl StoreError {
    /// Creates a database error from any error type.
    pub fn database<E: std::fmt::Display>(err: E) -> Self {
        Self::Database(err.to_string())
    }
}
