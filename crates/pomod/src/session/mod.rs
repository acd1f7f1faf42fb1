//! Per-chat sessions and the work/break state machine.
//!
//! - [`SessionStore`] maps chat ids to sessions, each with its own lock
//! - [`Scheduler`] applies `start`/`stop`/task selection and timer expiry
//! - [`PhaseTimer`] is the one-shot expiry armed on entering a timed phase

mod machine;
mod state;
mod store;
mod timer;

pub use machine::{announcement, Scheduler, Transition, TransitionError};
pub use state::{PhaseTicket, Progress, Session, SessionSnapshot, SessionState};
pub use store::SessionStore;
pub use timer::PhaseTimer;
