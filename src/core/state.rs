//! # Session lifecycle state machine.
//!
//! ```text
//!                 start                 connected / grace
//!   PENDING ───────────────► STARTING ─────────────────────► RUNNING ◄──┐
//!      ▲  │                     │  │                         │  │  ▲    │ resume
//!      │  │ stop                │  │ exit before running     │  │  │    │
//!      │  ▼                     │  ▼                  pause  │  │  └─ PAUSED
//!      │ STOPPED ◄──────────────┘ CRASHED ◄──────────────────┼──┘      │
//!      │   ▲   (stop mid-start)   │  │  ▲      unexpected exit│         │
//!      │   │                      │  │  └─────────────────────┘         │
//!      │   │          give up     │  │ retry                            │
//!      │   ├──────────────────────┘  ▼                                  │
//!      │   │                    RESTARTING ──► STARTING                 │
//!      │   │                                                            │
//!      │   └──── STOPPING ◄───────────── stop (RUNNING / PAUSED) ───────┘
//!      │
//!      └──── source exhausted with a next item (RUNNING), or skip (CRASHED)
//! ```
//!
//! `STOPPED` is the only terminal state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, encoder not launched.
    Pending,
    /// Encoder launched, connection not yet confirmed.
    Starting,
    /// Encoder confirmed live.
    Running,
    /// Encoder suspended.
    Paused,
    /// Termination requested.
    Stopping,
    /// Finished; terminal.
    Stopped,
    /// Encoder failed; a restart decision is pending.
    Crashed,
    /// Waiting out the restart backoff.
    Restarting,
}

impl SessionState {
    /// Whether `self → to` is an edge of the lifecycle graph.
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Pending, Starting)
                | (Pending, Stopped)
                | (Starting, Running)
                | (Starting, Crashed)
                | (Starting, Stopping)
                | (Starting, Stopped)
                | (Running, Paused)
                | (Running, Stopping)
                | (Running, Crashed)
                | (Running, Pending)
                | (Running, Stopped)
                | (Paused, Running)
                | (Paused, Stopping)
                | (Paused, Crashed)
                | (Stopping, Stopped)
                | (Crashed, Restarting)
                | (Crashed, Stopped)
                | (Crashed, Pending)
                | (Restarting, Starting)
                | (Restarting, Stopped)
        )
    }

    /// Only `STOPPED` is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped)
    }

    /// Counts against concurrency caps.
    pub fn occupies_slot(self) -> bool {
        !self.is_terminal()
    }

    /// States in which exactly one encoder process must be alive.
    pub fn holds_encoder(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    /// Upper-case name used in logs and events.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Pending => "PENDING",
            SessionState::Starting => "STARTING",
            SessionState::Running => "RUNNING",
            SessionState::Paused => "PAUSED",
            SessionState::Stopping => "STOPPING",
            SessionState::Stopped => "STOPPED",
            SessionState::Crashed => "CRASHED",
            SessionState::Restarting => "RESTARTING",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
