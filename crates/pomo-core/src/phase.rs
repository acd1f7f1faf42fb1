//! Phases of the work/break cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a session in the work/break cycle.
///
/// ```text
///   Idle ──start──▶ Working ──stop/expiry──▶ WorkEnded ──start──▶ OnBreak
///    ▲                                                              │
///    │                                                      stop/expiry
///    └──── stop (from any untimed phase) ◀── BreakEnded ◀───────────┘
///                                              │
///                                              └──start──▶ Working
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No cycle active.
    #[default]
    Idle,

    /// Counting down to the forced end of a work period.
    Working,

    /// Work period elapsed or was stopped; waiting for the user.
    WorkEnded,

    /// Counting down to the forced end of a break.
    OnBreak,

    /// Break elapsed or was stopped; waiting for the user.
    BreakEnded,
}

impl Phase {
    /// Returns true for phases that own a countdown timer.
    #[must_use]
    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Working | Self::OnBreak)
    }

    /// Short label used in logs and status lines.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::WorkEnded => "work ended",
            Self::OnBreak => "on break",
            Self::BreakEnded => "break ended",
        }
    }

    /// Nag text sent periodically while the phase awaits the user.
    #[must_use]
    pub fn reminder_text(&self) -> Option<&'static str> {
        match self {
            Self::WorkEnded => Some("Time for a break?"),
            Self::BreakEnded => Some("Time for a pomodoro?"),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
