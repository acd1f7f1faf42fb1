//! Connection handler for individual chat clients.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs the connect handshake, binding the connection to a chat
//! - Parses incoming lines and routes commands to the dispatcher
//! - Queues every outbound message on the connection's outbox, which a
//!   dedicated writer task drains to the socket
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pomo_core::ChatId;
use pomo_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion};

use super::routes::{Outbox, SocketNotifier};
use crate::dispatcher::{DispatchError, Dispatcher};

/// Maximum message size (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Read timeout for idle connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single client.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    outbox: Outbox,
    dispatcher: Dispatcher,
    routes: Arc<SocketNotifier>,

    /// Chat bound by the handshake
    chat_id: Option<ChatId>,

    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        outbox: Outbox,
        dispatcher: Dispatcher,
        routes: Arc<SocketNotifier>,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            outbox,
            dispatcher,
            routes,
            chat_id: None,
            connection_number,
        }
    }

    /// Runs the handshake and then the message loop until the client leaves.
    ///
    /// Returns the chat the connection was bound to, if any.
    pub async fn run(mut self) -> Option<ChatId> {
        debug!(connection = self.connection_number, "New client connected");

        if let Err(e) = self.handle_handshake().await {
            warn!(
                connection = self.connection_number,
                error = %e,
                "Handshake failed"
            );
            return None;
        }

        if let Err(e) = self.process_messages().await {
            debug!(chat_id = ?self.chat_id, error = %e, "Connection closed");
        }

        info!(chat_id = ?self.chat_id, "Client disconnected");
        self.chat_id
    }

    /// Expects `connect`, checks the version and allow-list, and binds the
    /// connection as the chat's route.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        if let Err(e) = msg.protocol_version.ensure_compatible() {
            self.send(DaemonMessage::rejected(&e.to_string())).await?;
            return Err(ConnectionError::VersionMismatch {
                client: msg.protocol_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.message {
            MessageType::Connect { chat_id } => {
                if !self.dispatcher.is_allowed(chat_id) {
                    self.send(DaemonMessage::rejected("chat is not allowed"))
                        .await?;
                    return Err(ConnectionError::NotAllowed(chat_id));
                }

                self.routes
                    .attach(chat_id, self.connection_number, self.outbox.clone())
                    .await;
                self.chat_id = Some(chat_id);
                self.send(DaemonMessage::connected(chat_id)).await?;
                info!(chat_id = %chat_id, connection = self.connection_number, "Chat connected");
                Ok(())
            }
            other => {
                self.send(DaemonMessage::error("Expected connect message for handshake"))
                    .await?;
                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => return Ok(()),
                Ok(Err(ConnectionError::ParseError(e))) => {
                    // A malformed line does not end the session
                    self.send(DaemonMessage::error_with_code(&e, "parse_error"))
                        .await?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(ConnectionError::Timeout),
            };

            match msg.message {
                MessageType::Connect { .. } => {
                    self.send(DaemonMessage::error("Already connected")).await?;
                }
                MessageType::Command { text } => self.handle_command(&text).await,
                MessageType::Ping { seq } => self.send(DaemonMessage::pong(seq)).await?,
                MessageType::Disconnect => {
                    debug!(chat_id = ?self.chat_id, "Client requested disconnect");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_command(&self, text: &str) {
        let Some(chat_id) = self.chat_id else {
            return;
        };

        // Replies reach the client through the notifier route.
        match self.dispatcher.dispatch(chat_id, text).await {
            Ok(phase) => debug!(chat_id = %chat_id, phase = %phase, "Command handled"),
            Err(DispatchError::UnknownCommand(_)) => {}
            Err(e) => debug!(chat_id = %chat_id, error = %e, "Command not applied"),
        }
    }

    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        serde_json::from_str(&line).map_err(|e| ConnectionError::ParseError(e.to_string()))
    }

    async fn send(&self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        self.outbox
            .send(msg)
            .await
            .map_err(|_| ConnectionError::Io("writer task stopped".to_string()))
    }
}

/// Drains a connection's outbox to its socket until every sender is gone.
pub async fn write_loop(writer: OwnedWriteHalf, mut outbox: mpsc::Receiver<DaemonMessage>) {
    let mut writer = BufWriter::new(writer);

    while let Some(msg) = outbox.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize daemon message");
                continue;
            }
        };

        let result = timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "Client write failed, stopping writer");
                break;
            }
            Err(_) => {
                debug!("Client write timed out, stopping writer");
                break;
            }
        }
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("Chat {0} is not allowed")]
    NotAllowed(ChatId),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}
