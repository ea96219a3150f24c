//! # Automatic restart decisions.
//!
//! [`RestartPolicy`] answers one question for a session whose encoder just crashed:
//! restart it (after how long) or give up.
//!
//! ```text
//! crash ──► decide(restart_count)
//!              ├─ restart_count < max_restarts ─► Retry { delay = backoff.next(restart_count) }
//!              └─ otherwise                    ─► GiveUp
//! ```
//!
//! `max_restarts = 0` disables automatic restarts entirely.

use std::time::Duration;

use super::BackoffPolicy;

/// Restart cap plus the backoff between attempts.
#[derive(Clone, Copy, Debug, Default)]
pub struct RestartPolicy {
    /// Automatic restarts allowed before the session is stopped for good.
    pub max_restarts: u32,
    /// Delay schedule between restarts.
    pub backoff: BackoffPolicy,
}

/// Outcome of [`RestartPolicy::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartDecision {
    /// Wait `delay`, then relaunch.
    Retry {
        /// Backoff before the relaunch.
        delay: Duration,
    },
    /// The cap is reached.
    GiveUp,
}

impl RestartPolicy {
    /// Decides what to do after a crash, given the restarts already performed.
    pub fn decide(&self, restarts_done: u32) -> RestartDecision {
        if restarts_done >= self.max_restarts {
            RestartDecision::GiveUp
        } else {
            RestartDecision::Retry {
                delay: self.backoff.next(restarts_done),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    #[test]
    fn gives_up_at_cap() {
        let policy = RestartPolicy {
            max_restarts: 2,
            backoff: BackoffPolicy {
                first: Duration::from_millis(100),
                max: Duration::from_secs(1),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
        };
        assert_eq!(
            policy.decide(0),
            RestartDecision::Retry {
                delay: Duration::from_millis(100)
            }
        );
        assert_eq!(
            policy.decide(1),
            RestartDecision::Retry {
                delay: Duration::from_millis(200)
            }
        );
        assert_eq!(policy.decide(2), RestartDecision::GiveUp);
        assert_eq!(policy.decide(3), RestartDecision::GiveUp);
    }

    #[test]
    fn zero_cap_never_restarts() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.decide(0), RestartDecision::GiveUp);
    }
}
