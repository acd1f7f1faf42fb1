//! Shared test doubles for the scheduler integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pomo_core::{ChatId, HistoryRecord, Keyboard, MessageRef, RecordId, TaskId};
use pomod::config::TimerSettings;
use pomod::notifier::{NotifyError, Notifier};
use pomod::session::Scheduler;
use pomod::store::{HistoryStore, InMemoryStore, StoreError, TaskStore};

/// One notifier call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        chat_id: ChatId,
        id: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat_id: ChatId,
        id: MessageRef,
        text: String,
    },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Sent::Message { text, .. } | Sent::Edit { text, .. } => text,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Sent::Message { chat_id, .. } | Sent::Edit { chat_id, .. } => *chat_id,
        }
    }
}

/// Notifier that records every call and can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
    failing: AtomicBool,
    latency_ms: AtomicU64,
}

impl RecordingNotifier {
    /// Makes every new message take `latency` before it is delivered.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts of new messages (not edits) sent to `chat_id`.
    pub fn messages_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Message { .. }) && s.chat_id() == chat_id)
            .map(|s| s.text().to_string())
            .collect()
    }

    pub fn edits_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Edit { .. }) && s.chat_id() == chat_id)
            .map(|s| s.text().to_string())
            .collect()
    }

    pub fn count_text(&self, chat_id: ChatId, text: &str) -> usize {
        self.messages_to(chat_id)
            .iter()
            .filter(|t| t.as_str() == text)
            .count()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, NotifyError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("injected failure".to_string()));
        }
        let id = MessageRef::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sent.lock().unwrap().push(Sent::Message {
            chat_id,
            id,
            text: text.to_string(),
            keyboard,
        });
        Ok(id)
    }

    async fn update_message(
        &self,
        chat_id: ChatId,
        message: MessageRef,
        text: &str,
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("injected failure".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Edit {
            chat_id,
            id: message,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// History store that counts calls and can be switched to fail.
#[derive(Default)]
pub struct RecordingHistory {
    inner: InMemoryStore,
    opens: AtomicUsize,
    closes: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingHistory {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for RecordingHistory {
    async fn open_record(
        &self,
        chat_id: ChatId,
        task_id: Option<TaskId>,
    ) -> Result<RecordId, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected failure".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open_record(chat_id, task_id).await
    }

    async fn close_record(&self, record: RecordId) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected failure".to_string()));
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close_record(record).await
    }

    async fn records(&self, chat_id: ChatId) -> Result<Vec<HistoryRecord>, StoreError> {
        self.inner.records(chat_id).await
    }
}

/// Scheduler wired to recording collaborators.
pub struct Harness {
    pub scheduler: Scheduler,
    pub notifier: Arc<RecordingNotifier>,
    pub history: Arc<RecordingHistory>,
    pub tasks: Arc<InMemoryStore>,
}

impl Harness {
    pub fn new(settings: TimerSettings) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let history = Arc::new(RecordingHistory::default());
        let tasks = Arc::new(InMemoryStore::new());

        let notifier_dyn: Arc<dyn Notifier> = notifier.clone();
        let history_dyn: Arc<dyn HistoryStore> = history.clone();
        let tasks_dyn: Arc<dyn TaskStore> = tasks.clone();

        Self {
            scheduler: Scheduler::new(notifier_dyn, history_dyn, tasks_dyn, settings),
            notifier,
            history,
            tasks,
        }
    }
}

/// Two-second work, one-second break and reminder interval.
pub fn fast_settings() -> TimerSettings {
    TimerSettings {
        work: Duration::from_secs(2),
        short_break: Duration::from_secs(1),
        reminder_interval: Duration::from_secs(1),
        tick: Duration::from_millis(100),
    }
}

/// Long phases for tests that must never see a timer fire.
pub fn slow_settings() -> TimerSettings {
    TimerSettings {
        work: Duration::from_secs(3600),
        short_break: Duration::from_secs(600),
        reminder_interval: Duration::from_secs(60),
        tick: Duration::from_secs(1),
    }
}

pub fn chat(id: i64) -> ChatId {
    ChatId::new(id)
}
