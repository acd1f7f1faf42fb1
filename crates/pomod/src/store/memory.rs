//! Process-lifetime store.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use pomo_core::{ChatId, HistoryRecord, RecordId, Task, TaskId};

use super::{HistoryStore, StoreError, TaskStore};

/// In-memory history and task store.
///
/// Operations never block on I/O, so a plain mutex is held only for the
/// duration of each call.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_record: i64,
    records: Vec<HistoryRecord>,
    next_task: i64,
    tasks: Vec<Task>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn open_record(
        &self,
        chat_id: ChatId,
        task_id: Option<TaskId>,
    ) -> Result<RecordId, StoreError> {
        let mut inner = self.lock()?;
        inner.next_record += 1;
        let id = RecordId::new(inner.next_record);
        inner.records.push(HistoryRecord::open(id, chat_id, task_id));
        Ok(id)
    }

    async fn close_record(&self, record: RecordId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let entry = inner
            .records
            .iter_mut()
            .find(|r| r.id == record)
            .ok_or(StoreError::RecordNotFound(record))?;
        entry.close();
        Ok(())
    }

    async fn records(&self, chat_id: ChatId) -> Result<Vec<HistoryRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn find_task_by_name(
        &self,
        chat_id: ChatId,
        name: &str,
    ) -> Result<Option<TaskId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tasks
            .iter()
            .find(|t| t.chat_id == chat_id && t.name == name)
            .map(|t| t.id))
    }

    async fn list_tasks(&self, chat_id: ChatId) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|t| t.chat_id == chat_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tasks)
    }

    async fn add_task(&self, chat_id: ChatId, name: &str) -> Result<Task, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .tasks
            .iter()
            .any(|t| t.chat_id == chat_id && t.name == name)
        {
            return Err(StoreError::DuplicateTask(name.to_string()));
        }
        inner.next_task += 1;
        let task = Task {
            id: TaskId::new(inner.next_task),
            chat_id,
            name: name.to_string(),
        };
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn delete_task(&self, chat_id: ChatId, name: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.tasks.len();
        inner
            .tasks
            .retain(|t| !(t.chat_id == chat_id && t.name == name));
        Ok(inner.tasks.len() != before)
    }
}
