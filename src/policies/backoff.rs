//! # Delay between automatic restarts.
//!
//! [`BackoffPolicy`] computes how long a crashed session waits in `RESTARTING`
//! before its encoder is launched again.
//!
//! The delay before restart `n` (0-indexed) is `first × factor^n`, clamped to `max`,
//! then jitter is applied. The base is derived from the restart number alone, so
//! jitter never compounds across attempts.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use castvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(5),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(5));
//! assert_eq!(backoff.next(1), Duration::from_secs(10));
//! assert_eq!(backoff.next(8), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff parameters.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first restart.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant delay).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 5s delay, capped at 60s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(5),
            max: Duration::from_secs(60),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay preceding restart number `attempt` (0-indexed).
    ///
    /// Non-finite or negative intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_secs(5),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn doubles_until_cap() {
        let b = doubling();
        assert_eq!(b.next(0), Duration::from_secs(5));
        assert_eq!(b.next(1), Duration::from_secs(10));
        assert_eq!(b.next(2), Duration::from_secs(20));
        assert_eq!(b.next(3), Duration::from_secs(40));
        assert_eq!(b.next(4), Duration::from_secs(60));
        assert_eq!(b.next(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn constant_when_factor_is_one() {
        let b = BackoffPolicy::default();
        for attempt in 0..6 {
            assert_eq!(b.next(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        let b = BackoffPolicy {
            first: Duration::from_secs(90),
            ..doubling()
        };
        assert_eq!(b.next(0), Duration::from_secs(60));
    }

    #[test]
    fn jitter_never_exceeds_base() {
        let b = BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..doubling()
        };
        for attempt in 0..10 {
            assert!(b.next(attempt) <= doubling().next(attempt));
        }
    }
}
