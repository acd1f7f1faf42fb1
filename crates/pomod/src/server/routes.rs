//! Socket-backed notifier.
//!
//! Each connected client binds itself to one chat. Messages the scheduler
//! addresses to that chat are queued on the client's outbox and written by
//! its connection's writer task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use pomo_core::{ChatId, Keyboard, MessageRef};
use pomo_protocol::DaemonMessage;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::notifier::{NotifyError, Notifier};

/// Sender half of a connection's outbound queue.
pub type Outbox = mpsc::Sender<DaemonMessage>;

struct Route {
    connection: u64,
    outbox: Outbox,
}

/// Routes chat messages to the connection currently bound to each chat.
#[derive(Default)]
pub struct SocketNotifier {
    routes: RwLock<HashMap<ChatId, Route>>,
    next_message_id: AtomicI64,
}

impl SocketNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `chat_id` to a connection, replacing any earlier binding.
    pub async fn attach(&self, chat_id: ChatId, connection: u64, outbox: Outbox) {
        let previous = self
            .routes
            .write()
            .await
            .insert(chat_id, Route { connection, outbox });
        if let Some(previous) = previous {
            debug!(
                chat_id = %chat_id,
                old_connection = previous.connection,
                new_connection = connection,
                "Chat route replaced"
            );
        }
    }

    /// Removes the binding if it still belongs to `connection`.
    pub async fn detach(&self, chat_id: ChatId, connection: u64) {
        let mut routes = self.routes.write().await;
        if routes
            .get(&chat_id)
            .is_some_and(|route| route.connection == connection)
        {
            routes.remove(&chat_id);
            debug!(chat_id = %chat_id, connection, "Chat route removed");
        }
    }

    pub async fn is_routed(&self, chat_id: ChatId) -> bool {
        self.routes.read().await.contains_key(&chat_id)
    }

    pub async fn clear(&self) {
        self.routes.write().await.clear();
    }

    async fn deliver(&self, chat_id: ChatId, msg: DaemonMessage) -> Result<(), NotifyError> {
        let outbox = self
            .routes
            .read()
            .await
            .get(&chat_id)
            .map(|route| route.outbox.clone())
            .ok_or(NotifyError::NoRoute(chat_id))?;

        // Never wait on a slow client: callers may hold a session lock.
        outbox.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                NotifyError::Transport(format!("outbound queue for chat {chat_id} is full"))
            }
            mpsc::error::TrySendError::Closed(_) => NotifyError::ChannelClosed(chat_id),
        })
    }
}

#[async_trait]
impl Notifier for SocketNotifier {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, NotifyError> {
        let id = MessageRef::new(self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.deliver(chat_id, DaemonMessage::message(id, text, keyboard))
            .await?;
        Ok(id)
    }

    async fn update_message(
        &self,
        chat_id: ChatId,
        message: MessageRef,
        text: &str,
    ) -> Result<(), NotifyError> {
        self.deliver(chat_id, DaemonMessage::message_edited(message, text))
            .await
    }
}
