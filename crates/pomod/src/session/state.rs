//! Per-chat session state.

use std::time::Duration;

use pomo_core::{ChatId, MessageRef, Phase, RecordId, TaskId};
use tokio::sync::{Mutex, MutexGuard, TryLockError};
use tokio::time::Instant;

use super::timer::PhaseTimer;
use crate::config::TimerSettings;

/// Identifies one entry into a phase.
///
/// A timer captures the ticket of the phase it was armed for; on expiry the
/// ticket is compared with the session's current one, so an expiry racing a
/// manual stop can never transition the session twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTicket {
    pub phase: Phase,
    entry: u64,
}

/// Mutable state of one chat. Only reachable through [`Session::lock`].
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    selected_task: Option<TaskId>,
    phase_started_at: Instant,
    timer: Option<PhaseTimer>,
    live_message: Option<MessageRef>,
    history_record: Option<RecordId>,

    /// Reminder boundaries already announced in the current phase
    reminders_sent: u32,

    /// Number of phase entries so far
    entry: u64,
}

/// What the broadcaster should tell a chat this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Edit the live countdown message.
    Countdown {
        message: MessageRef,
        remaining: Duration,
    },

    /// Send a one-shot nag.
    Reminder { phase: Phase, text: &'static str },
}

impl SessionState {
    fn new(now: Instant) -> Self {
        Self {
            phase: Phase::Idle,
            selected_task: None,
            phase_started_at: now,
            timer: None,
            live_message: None,
            history_record: None,
            reminders_sent: 0,
            entry: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected_task(&self) -> Option<TaskId> {
        self.selected_task
    }

    pub fn phase_started_at(&self) -> Instant {
        self.phase_started_at
    }

    pub fn live_message(&self) -> Option<MessageRef> {
        self.live_message
    }

    pub fn history_record(&self) -> Option<RecordId> {
        self.history_record
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn ticket(&self) -> PhaseTicket {
        PhaseTicket {
            phase: self.phase,
            entry: self.entry,
        }
    }

    /// Returns true if `ticket` still describes the current phase entry.
    pub fn is_current(&self, ticket: PhaseTicket) -> bool {
        self.phase == ticket.phase && self.entry == ticket.entry
    }

    pub(crate) fn select_task(&mut self, task: TaskId) {
        self.selected_task = Some(task);
    }

    /// Moves to `phase`, cancelling any timer and dropping phase-scoped handles.
    ///
    /// Returns the history record that was open, so the caller can close it
    /// exactly once after releasing the lock.
    pub(crate) fn enter(&mut self, phase: Phase, now: Instant) -> Option<RecordId> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.phase = phase;
        self.phase_started_at = now.max(self.phase_started_at);
        self.live_message = None;
        self.reminders_sent = 0;
        self.entry += 1;
        self.history_record.take()
    }

    pub(crate) fn attach_timer(&mut self, timer: PhaseTimer) {
        if let Some(old) = self.timer.replace(timer) {
            old.cancel();
        }
    }

    pub(crate) fn attach_message(&mut self, message: MessageRef) {
        self.live_message = Some(message);
    }

    pub(crate) fn attach_record(&mut self, record: RecordId) {
        self.history_record = Some(record);
    }

    /// Time left in a timed phase, clamped at zero.
    pub fn remaining(&self, now: Instant, settings: &TimerSettings) -> Option<Duration> {
        let length = settings.phase_length(self.phase)?;
        let elapsed = now.saturating_duration_since(self.phase_started_at);
        Some(length.saturating_sub(elapsed))
    }

    /// Decides what the broadcaster owes this chat at `now`.
    ///
    /// A reminder is due once per `reminder_interval` boundary crossed since
    /// the phase began. Boundaries crossed while ticks were delayed are
    /// coalesced into a single reminder.
    pub(crate) fn progress(&mut self, now: Instant, settings: &TimerSettings) -> Option<Progress> {
        if self.phase.is_timed() {
            let message = self.live_message?;
            let remaining = self.remaining(now, settings)?;
            return Some(Progress::Countdown { message, remaining });
        }

        let text = self.phase.reminder_text()?;
        let interval = settings.reminder_interval.as_nanos();
        if interval == 0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.phase_started_at).as_nanos();
        let boundaries = u32::try_from(elapsed / interval).unwrap_or(u32::MAX);
        if boundaries > self.reminders_sent {
            self.reminders_sent = boundaries;
            return Some(Progress::Reminder {
                phase: self.phase,
                text,
            });
        }
        None
    }
}

/// A chat's session: its identity plus exclusively-locked state.
///
/// Each session owns its own lock, so a slow transition for one chat never
/// blocks another.
#[derive(Debug)]
pub struct Session {
    chat_id: ChatId,
    state: Mutex<SessionState>,
}

/// Point-in-time copy of a session, safe to inspect without the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub chat_id: ChatId,
    pub phase: Phase,
    pub selected_task: Option<TaskId>,
    pub phase_started_at: Instant,
    pub has_timer: bool,
    pub live_message: Option<MessageRef>,
    pub history_record: Option<RecordId>,
}

impl Session {
    pub(crate) fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            state: Mutex::new(SessionState::new(Instant::now())),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Acquires exclusive access to the session state.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Acquires the state only if no one else holds it.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, SessionState>, TryLockError> {
        self.state.try_lock()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            chat_id: self.chat_id,
            phase: state.phase,
            selected_task: state.selected_task,
            phase_started_at: state.phase_started_at,
            has_timer: state.timer.is_some(),
            live_message: state.live_message,
            history_record: state.history_record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TimerSettings {
        TimerSettings {
            work: Duration::from_secs(2),
            short_break: Duration::from_secs(1),
            reminder_interval: Duration::from_secs(1),
            tick: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let state = SessionState::new(Instant::now());
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.selected_task().is_none());
        assert!(!state.has_timer());
        assert!(state.history_record().is_none());
    }

    #[test]
    fn test_enter_invalidates_old_ticket() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        state.enter(Phase::Working, now);
        let ticket = state.ticket();
        assert!(state.is_current(ticket));

        state.enter(Phase::WorkEnded, now);
        assert!(!state.is_current(ticket));

        // Re-entering the same phase is a new entry too
        state.enter(Phase::Working, now);
        assert!(!state.is_current(ticket));
    }

    #[test]
    fn test_enter_returns_open_record_once() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        state.enter(Phase::Working, now);
        state.attach_record(RecordId::new(3));
        state.attach_message(MessageRef::new(1));

        assert_eq!(state.enter(Phase::WorkEnded, now), Some(RecordId::new(3)));
        assert!(state.live_message().is_none());
        assert_eq!(state.enter(Phase::Idle, now), None);
    }

    #[test]
    fn test_started_at_never_moves_backwards() {
        let now = Instant::now();
        let mut state = SessionState::new(now + Duration::from_secs(5));
        state.enter(Phase::Working, now);
        assert_eq!(state.phase_started_at(), now + Duration::from_secs(5));
    }

    #[test]
    fn test_remaining_is_clamped() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        state.enter(Phase::Working, now);
        let s = settings();

        assert_eq!(state.remaining(now, &s), Some(Duration::from_secs(2)));
        assert_eq!(
            state.remaining(now + Duration::from_secs(1), &s),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            state.remaining(now + Duration::from_secs(2), &s),
            Some(Duration::ZERO)
        );
        assert_eq!(
            state.remaining(now + Duration::from_secs(9), &s),
            Some(Duration::ZERO)
        );

        state.enter(Phase::WorkEnded, now);
        assert_eq!(state.remaining(now, &s), None);
    }

    #[test]
    fn test_countdown_needs_live_message() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        state.enter(Phase::OnBreak, now);
        assert_eq!(state.progress(now, &settings()), None);

        state.attach_message(MessageRef::new(8));
        assert_eq!(
            state.progress(now, &settings()),
            Some(Progress::Countdown {
                message: MessageRef::new(8),
                remaining: Duration::from_secs(1),
            })
        );
    }

    #[test]
    fn test_reminder_once_per_boundary() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        state.enter(Phase::WorkEnded, now);
        let s = settings();

        let mut sent = 0;
        // 3.5 intervals at quarter-interval ticks
        for quarter in 0..=14 {
            let at = now + Duration::from_millis(250 * quarter);
            if let Some(Progress::Reminder { text, .. }) = state.progress(at, &s) {
                assert_eq!(text, "Time for a break?");
                sent += 1;
            }
        }
        assert_eq!(sent, 3);
    }

    #[test]
    fn test_delayed_tick_coalesces_reminders() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        state.enter(Phase::BreakEnded, now);
        let s = settings();

        assert!(state.progress(now + Duration::from_secs(3), &s).is_some());
        assert!(state.progress(now + Duration::from_millis(3500), &s).is_none());
        assert!(state.progress(now + Duration::from_secs(4), &s).is_some());
    }

    #[test]
    fn test_idle_gets_nothing() {
        let now = Instant::now();
        let mut state = SessionState::new(now);
        assert!(state.progress(now + Duration::from_secs(100), &settings()).is_none());
    }
}
