//! Phase state machine.
//!
//! Every transition runs under the session's own lock. Starting a phase makes
//! its external calls under that lock, since their results (the countdown
//! message, the history record) become session state and the announcement
//! must precede the countdown. Ending a phase releases the lock first, then
//! closes the record and announces.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pomo_core::{format_duration, ChatId, Keyboard, Phase, RecordId, TaskId};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::state::{PhaseTicket, SessionSnapshot, SessionState};
use super::store::SessionStore;
use super::timer::PhaseTimer;
use crate::config::TimerSettings;
use crate::notifier::Notifier;
use crate::store::{HistoryStore, TaskStore};

/// A completed phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Commands rejected without changing the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// `start` while a countdown is already running.
    #[error("already {phase}, {} left", format_duration(.remaining.to_owned()))]
    AlreadyRunning { phase: Phase, remaining: Duration },

    #[error("task not found: {name}")]
    TaskNotFound { name: String },

    #[error("task lookup failed: {0}")]
    TaskLookupFailed(String),
}

/// Drives the work/break cycle of every chat.
///
/// Cheap to clone; clones share the session store and collaborators.
#[derive(Clone)]
pub struct Scheduler {
    sessions: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    history: Arc<dyn HistoryStore>,
    tasks: Arc<dyn TaskStore>,
    settings: TimerSettings,
}

impl Scheduler {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        history: Arc<dyn HistoryStore>,
        tasks: Arc<dyn TaskStore>,
        settings: TimerSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            notifier,
            history,
            tasks,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn tasks(&self) -> &Arc<dyn TaskStore> {
        &self.tasks
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Current state of a chat's session, creating it if needed.
    pub async fn snapshot(&self, chat_id: ChatId) -> SessionSnapshot {
        self.sessions.get_or_create(chat_id).await.snapshot().await
    }

    /// `start`: begin work from `Idle`/`BreakEnded`, or a break from `WorkEnded`.
    ///
    /// # Errors
    ///
    /// `TransitionError::AlreadyRunning` if a countdown is in progress.
    pub async fn start(&self, chat_id: ChatId) -> Result<Transition, TransitionError> {
        let session = self.sessions.get_or_create(chat_id).await;
        let mut state = session.lock().await;
        let from = state.phase();
        let now = Instant::now();

        let to = match from {
            Phase::Idle | Phase::BreakEnded => Phase::Working,
            Phase::WorkEnded => Phase::OnBreak,
            Phase::Working | Phase::OnBreak => {
                let remaining = state.remaining(now, &self.settings).unwrap_or_default();
                debug!(chat_id = %chat_id, phase = %from, "Start rejected, already running");
                return Err(TransitionError::AlreadyRunning {
                    phase: from,
                    remaining,
                });
            }
        };

        // Untimed phases never hold a history record
        state.enter(to, now);

        self.announce(chat_id, to).await;
        self.begin_countdown(chat_id, &mut state).await;
        if to == Phase::Working {
            let task = state.selected_task();
            match self.history.open_record(chat_id, task).await {
                Ok(record) => state.attach_record(record),
                Err(e) => warn!(chat_id = %chat_id, error = %e, "Failed to open history record"),
            }
        }
        drop(state);

        let transition = Transition { from, to };
        info!(chat_id = %chat_id, %transition, "Phase started");
        Ok(transition)
    }

    /// `stop`: end the running phase early, or reset any other phase to `Idle`.
    ///
    /// Never rejected; `selectedTask` is left untouched.
    pub async fn stop(&self, chat_id: ChatId) -> Transition {
        let session = self.sessions.get_or_create(chat_id).await;
        let mut state = session.lock().await;
        let from = state.phase();
        let to = match from {
            Phase::Working => Phase::WorkEnded,
            Phase::OnBreak => Phase::BreakEnded,
            _ => Phase::Idle,
        };
        let closing = state.enter(to, Instant::now());
        drop(state);

        self.finish(chat_id, Transition { from, to }, closing).await
    }

    /// Timer expiry. A no-op unless `ticket` is still the session's current
    /// phase entry, which makes a fire racing a manual stop harmless.
    ///
    /// Invoked by the phase timer; exposed for callers that schedule expiry
    /// themselves.
    pub async fn expire(&self, chat_id: ChatId, ticket: PhaseTicket) -> Option<Transition> {
        let session = self.sessions.get(chat_id).await?;
        let mut state = session.lock().await;
        if !state.is_current(ticket) {
            debug!(chat_id = %chat_id, phase = %state.phase(), "Stale timer expiry ignored");
            return None;
        }

        let from = state.phase();
        let to = match from {
            Phase::Working => Phase::WorkEnded,
            Phase::OnBreak => Phase::BreakEnded,
            _ => return None,
        };
        let closing = state.enter(to, Instant::now());
        drop(state);

        Some(self.finish(chat_id, Transition { from, to }, closing).await)
    }

    /// Selects the task subsequent work periods are attributed to.
    ///
    /// Allowed in any phase; the phase itself is not changed. The task store
    /// is queried before the session lock is taken.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` if the chat has no task named `name`, or
    /// `TaskLookupFailed` if the task store could not be queried.
    pub async fn select_task(&self, chat_id: ChatId, name: &str) -> Result<TaskId, TransitionError> {
        let task = self
            .tasks
            .find_task_by_name(chat_id, name)
            .await
            .map_err(|e| {
                warn!(chat_id = %chat_id, error = %e, "Task lookup failed");
                TransitionError::TaskLookupFailed(e.to_string())
            })?
            .ok_or_else(|| TransitionError::TaskNotFound {
                name: name.to_string(),
            })?;

        let session = self.sessions.get_or_create(chat_id).await;
        session.lock().await.select_task(task);
        info!(chat_id = %chat_id, task = %task, name = %name, "Task selected");
        Ok(task)
    }

    /// Sends the countdown message and arms the expiry timer for the
    /// phase the session has just entered.
    async fn begin_countdown(&self, chat_id: ChatId, state: &mut SessionState) {
        let Some(length) = self.settings.phase_length(state.phase()) else {
            return;
        };

        match self
            .notifier
            .send_message(chat_id, &format_duration(length), None)
            .await
        {
            Ok(message) => state.attach_message(message),
            Err(e) => warn!(chat_id = %chat_id, error = %e, "Failed to send countdown message"),
        }

        // Same origin as the countdown, so 00:00 and expiry coincide
        let deadline = state.phase_started_at() + length;
        let ticket = state.ticket();
        let scheduler = self.clone();
        let timer = PhaseTimer::arm(deadline, move || async move {
            debug!(chat_id = %chat_id, phase = %ticket.phase, "Phase timer fired");
            scheduler.expire(chat_id, ticket).await;
        });
        debug!(chat_id = %chat_id, phase = %ticket.phase, secs = length.as_secs(), "Phase timer armed");
        state.attach_timer(timer);
    }

    /// Post-lock half of `stop` and `expire`.
    async fn finish(
        &self,
        chat_id: ChatId,
        transition: Transition,
        closing: Option<RecordId>,
    ) -> Transition {
        if let Some(record) = closing {
            self.close_record(chat_id, record).await;
        }
        self.announce(chat_id, transition.to).await;
        info!(chat_id = %chat_id, %transition, "Phase ended");
        transition
    }

    async fn close_record(&self, chat_id: ChatId, record: RecordId) {
        if let Err(e) = self.history.close_record(record).await {
            warn!(chat_id = %chat_id, record = %record, error = %e, "Failed to close history record");
        }
    }

    async fn announce(&self, chat_id: ChatId, phase: Phase) {
        let text = announcement(phase);
        if let Err(e) = self
            .notifier
            .send_message(chat_id, text, Some(Keyboard::for_phase(phase)))
            .await
        {
            warn!(chat_id = %chat_id, error = %e, "Failed to announce phase");
        }
    }
}

/// Status line sent when a session enters `phase`.
pub fn announcement(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Timer reset",
        Phase::Working => "Pomodoro started",
        Phase::WorkEnded => "Pomodoro ended",
        Phase::OnBreak => "Break started",
        Phase::BreakEnded => "Break ended",
    }
}
