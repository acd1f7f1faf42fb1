//! Pomo Daemon - Per-chat pomodoro scheduler
//!
//! This crate provides the core infrastructure for the pomo daemon:
//! - `session` - Session store, per-session timers and the phase state machine
//! - `broadcaster` - Fixed-tick countdown updates and reminders
//! - `dispatcher` - Text command routing for allow-listed chats
//! - `store` - History and task store capabilities (in-memory, SQLite)
//! - `notifier` - Outbound message capability
//! - `server` - Unix socket server for chat clients
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         pomod daemon                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  ┌─────────────────┐   ┌────────────┐   ┌──────────────────┐  │
//! │  │  DaemonServer   │──▶│ Dispatcher │──▶│    Scheduler     │  │
//! │  │ (Unix Socket)   │   └────────────┘   │ (state machine)  │  │
//! │  └────────┬────────┘                    └───┬─────────┬────┘  │
//! │           │ routes                          │ arms    │ locks │
//! │           ▼                                 ▼         ▼       │
//! │  ┌─────────────────┐   ┌─────────────┐   ┌──────────────────┐ │
//! │  │ SocketNotifier  │◀──│ Broadcaster │──▶│   SessionStore   │ │
//! │  │ (per-chat route)│   │ (1s tick)   │   │ ChatId → Session │ │
//! │  └─────────────────┘   └─────────────┘   └──────────────────┘ │
//! │                                                               │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Collaborator failures are logged and never abort a transition

pub mod broadcaster;
pub mod config;
pub mod dispatcher;
pub mod notifier;
pub mod server;
pub mod session;
pub mod store;
