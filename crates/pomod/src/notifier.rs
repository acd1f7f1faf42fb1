//! Outbound message capability.
//!
//! The scheduler never talks to a transport directly. It hands text to a
//! [`Notifier`], which delivers it to the chat and returns a handle for
//! later in-place edits. Failures are reported back but never abort a
//! phase transition; callers log them and move on.

use async_trait::async_trait;
use pomo_core::{ChatId, Keyboard, MessageRef};
use thiserror::Error;

/// Delivers messages to chats.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a new message, optionally with a reply keyboard.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, NotifyError>;

    /// Replaces the text of a message sent earlier.
    async fn update_message(
        &self,
        chat_id: ChatId,
        message: MessageRef,
        text: &str,
    ) -> Result<(), NotifyError>;
}

/// Errors a notifier can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    /// No client is currently connected for the chat.
    #[error("no route to chat {0}")]
    NoRoute(ChatId),

    /// The chat's outbound queue is closed.
    #[error("outbound channel for chat {0} closed")]
    ChannelClosed(ChatId),

    #[error("transport error: {0}")]
    Transport(String),
}
