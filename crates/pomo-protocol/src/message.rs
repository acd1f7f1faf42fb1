//! Protocol message types for daemon communication.

use crate::version::ProtocolVersion;
use pomo_core::{ChatId, Keyboard, MessageRef};
use serde::{Deserialize, Serialize};

/// Message types that can be sent by clients to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Handshake: bind this connection to a chat
    Connect { chat_id: ChatId },

    /// A line typed by the user (`/start`, `/tasks set x`, ...)
    Command { text: String },

    /// Ping to check connection
    Ping { seq: u64 },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub protocol_version: ProtocolVersion,

    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    pub fn connect(chat_id: ChatId) -> Self {
        Self::new(MessageType::Connect { chat_id })
    }

    pub fn command(text: impl Into<String>) -> Self {
        Self::new(MessageType::Command { text: text.into() })
    }

    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Handshake accepted
    Connected {
        protocol_version: ProtocolVersion,
        chat_id: ChatId,
    },

    /// Handshake rejected (version mismatch, chat not allowed)
    Rejected {
        reason: String,
        protocol_version: ProtocolVersion,
    },

    /// A new message for the chat
    Message {
        message_id: MessageRef,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyboard: Option<Keyboard>,
    },

    /// Replace the text of an earlier message (countdown updates)
    MessageEdited { message_id: MessageRef, text: String },

    Pong { seq: u64 },

    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl DaemonMessage {
    pub fn connected(chat_id: ChatId) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            chat_id,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn message(message_id: MessageRef, text: &str, keyboard: Option<Keyboard>) -> Self {
        Self::Message {
            message_id,
            text: text.to_string(),
            keyboard,
        }
    }

    pub fn message_edited(message_id: MessageRef, text: &str) -> Self {
        Self::MessageEdited {
            message_id,
            text: text.to_string(),
        }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}
