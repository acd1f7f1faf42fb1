//! Pomo Core - Shared types for per-chat pomodoro scheduling
//!
//! This crate provides the domain types shared between
//! the daemon (pomod), the wire protocol and the line client (pomo).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod command;
pub mod error;
pub mod format;
pub mod ids;
pub mod keyboard;
pub mod phase;
pub mod task;

// Re-exports for convenience
pub use command::{Command, TaskCommand};
pub use error::{DomainError, DomainResult};
pub use format::format_duration;
pub use ids::{ChatId, MessageRef, RecordId, TaskId};
pub use keyboard::Keyboard;
pub use phase::Phase;
pub use task::{HistoryRecord, Task};
