//! Pomo Protocol - Wire protocol for daemon communication
//!
//! Newline-delimited JSON spoken over the daemon's Unix socket. A client
//! connects as one chat, forwards typed commands, and receives the
//! messages and in-place edits the scheduler produces for that chat.

pub mod message;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, MessageType};
pub use version::{ProtocolVersion, VersionError};
