//! Progress broadcaster.
//!
//! Once per tick, visits every session:
//! - `Working`/`OnBreak`: edits the live countdown message with the time left
//! - `WorkEnded`/`BreakEnded`: sends a nag once per reminder interval
//!
//! Session fields are copied under the session lock and the lock is released
//! before the notifier is called, so a slow transport never holds up
//! commands for that chat. A session whose lock is held by a transition is
//! skipped for this tick; its reminder counter catches up on the next one.

use std::sync::Arc;

use pomo_core::format_duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::TimerSettings;
use crate::notifier::Notifier;
use crate::session::{Progress, Scheduler, SessionStore};

/// What one tick did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub countdowns: usize,
    pub reminders: usize,
    pub failures: usize,
    /// Sessions skipped because a transition held their lock.
    pub busy: usize,
}

/// Periodic countdown and reminder sender.
#[derive(Clone)]
pub struct Broadcaster {
    sessions: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    settings: TimerSettings,
}

impl Broadcaster {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            sessions: Arc::clone(scheduler.sessions()),
            notifier: Arc::clone(scheduler.notifier()),
            settings: *scheduler.settings(),
        }
    }

    /// Runs one pass over all sessions as of `now`.
    pub async fn tick(&self, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();

        for session in self.sessions.sessions().await {
            let chat_id = session.chat_id();
            let Ok(mut state) = session.try_lock() else {
                trace!(chat_id = %chat_id, "Session busy, skipping tick");
                summary.busy += 1;
                continue;
            };
            let progress = state.progress(now, &self.settings);
            drop(state);

            let result = match progress {
                None => continue,
                Some(Progress::Countdown { message, remaining }) => {
                    trace!(chat_id = %chat_id, remaining_secs = remaining.as_secs(), "Countdown update");
                    summary.countdowns += 1;
                    self.notifier
                        .update_message(chat_id, message, &format_duration(remaining))
                        .await
                }
                Some(Progress::Reminder { phase, text }) => {
                    debug!(chat_id = %chat_id, phase = %phase, "Sending reminder");
                    summary.reminders += 1;
                    self.notifier
                        .send_message(chat_id, text, None)
                        .await
                        .map(|_| ())
                }
            };

            if let Err(e) = result {
                summary.failures += 1;
                warn!(chat_id = %chat_id, error = %e, "Progress notification failed");
            }
        }

        summary
    }

    /// Spawns the fixed-interval loop. Stops when `cancel_token` fires.
    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.settings.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                tick_ms = self.settings.tick.as_millis() as u64,
                reminder_secs = self.settings.reminder_interval.as_secs(),
                "Progress broadcaster started"
            );

            loop {
                tokio::select! {
                    biased;

                    _ = cancel_token.cancelled() => {
                        info!("Progress broadcaster shutting down");
                        break;
                    }

                    _ = ticker.tick() => {
                        let summary = self.tick(Instant::now()).await;
                        if summary != TickSummary::default() {
                            trace!(?summary, "Broadcaster tick");
                        }
                    }
                }
            }

            debug!("Progress broadcaster task completed");
        })
    }
}
