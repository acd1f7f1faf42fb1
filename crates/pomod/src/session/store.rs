//! Chat id → session mapping.

use std::collections::HashMap;
use std::sync::Arc;

use pomo_core::ChatId;
use tokio::sync::RwLock;
use tracing::debug;

use super::state::Session;

/// Owns every session for the lifetime of the process.
///
/// The map lock only guards lookups and inserts; session contents are
/// guarded by each session's own lock, which is never taken while the map
/// lock is held. Sessions are never removed.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ChatId, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chat's session, creating an idle one on first contact.
    pub async fn get_or_create(&self, chat_id: ChatId) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(&chat_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(chat_id).or_insert_with(|| {
            debug!(chat_id = %chat_id, "Created session");
            Arc::new(Session::new(chat_id))
        });
        Arc::clone(session)
    }

    pub async fn get(&self, chat_id: ChatId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&chat_id).map(Arc::clone)
    }

    /// Snapshot of all sessions at this instant.
    ///
    /// Sessions created afterwards are picked up by the next call.
    pub async fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().map(Arc::clone).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_core::Phase;

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = SessionStore::new();
        let a = store.get_or_create(ChatId::new(1)).await;
        let b = store.get_or_create(ChatId::new(1)).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len().await, 1);
        assert_eq!(a.snapshot().await.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let store = SessionStore::new();
        assert!(store.get(ChatId::new(9)).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_locked_session_does_not_block_others() {
        let store = SessionStore::new();
        let busy = store.get_or_create(ChatId::new(1)).await;
        let _guard = busy.lock().await;

        // Another chat can be created and locked while chat 1 is held
        let other = store.get_or_create(ChatId::new(2)).await;
        let guard = tokio::time::timeout(std::time::Duration::from_secs(1), other.lock()).await;
        assert!(guard.is_ok());
        assert_eq!(store.sessions().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creation_yields_one_session() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.get_or_create(ChatId::new(7)).await
            }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert_eq!(store.len().await, 1);
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
