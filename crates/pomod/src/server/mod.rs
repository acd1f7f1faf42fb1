//! Unix socket server for the pomo daemon.
//!
//! The server:
//! - Listens on a Unix socket for chat client connections
//! - Spawns a `ConnectionHandler` and an outbox writer for each client
//! - Binds each handshaken connection as the route for its chat
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│   Dispatcher    │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │ attach
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SocketNotifier  │────▶│  write_loop     │
//! │ (chat → outbox) │     │  (per client)   │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;
mod routes;

pub use connection::{write_loop, ConnectionError, ConnectionHandler, MAX_MESSAGE_SIZE};
pub use routes::{Outbox, SocketNotifier};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;

/// Per-connection outbound queue length
pub const OUTBOX_CAPACITY: usize = 64;

/// Unix socket server for the pomo daemon.
pub struct DaemonServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    dispatcher: Dispatcher,

    /// Chat routes shared with the scheduler's notifier
    routes: Arc<SocketNotifier>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection numbers
    connection_counter: AtomicU64,
}

impl DaemonServer {
    /// Creates a new daemon server.
    ///
    /// `routes` must be the same notifier the dispatcher's scheduler sends
    /// through, or replies will never reach the clients.
    pub fn new(
        socket_path: impl Into<PathBuf>,
        dispatcher: Dispatcher,
        routes: Arc<SocketNotifier>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            dispatcher,
            routes,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;

        info!(
            socket = %self.socket_path.display(),
            "Daemon server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    fn bind(&self) -> Result<UnixListener, ServerError> {
        let setup_error = |e: std::io::Error| ServerError::SocketSetup {
            path: self.socket_path.clone(),
            error: e.to_string(),
        };

        // A stale socket from an earlier run would make bind fail
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(setup_error)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_error)?;
            }
        }

        UnixListener::bind(&self.socket_path).map_err(setup_error)
    }

    /// Spawns the writer and handler tasks for a new client.
    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let dispatcher = self.dispatcher.clone();
        let routes = Arc::clone(&self.routes);

        tokio::spawn(write_loop(writer, outbox_rx));

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(
                reader,
                outbox,
                dispatcher,
                Arc::clone(&routes),
                connection_number,
            );

            // The writer exits once the route and handler drop their senders
            if let Some(chat_id) = handler.run().await {
                routes.detach(chat_id, connection_number).await;
                debug!(chat_id = %chat_id, connection = connection_number, "Route released");
            }
        });
    }

    /// Performs cleanup on shutdown.
    async fn cleanup(&self) {
        self.routes.clear().await;

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
