//! # Per-caller rate gate.
//!
//! [`RateGate`] admits at most `calls` control operations per `period` for each
//! caller. It is a keyed GCRA limiter: the bucket holds `calls` cells and regains
//! one every `period / calls`, so a caller that drains the bucket gets it back in
//! full after one `period`. Denied calls are rejected at once, never queued.
//!
//! Privileged callers bypass the gate. `calls = 0` disables it.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};

use crate::core::CallerId;
use crate::error::OrchestratorError;

type KeyedLimiter<C> =
    RateLimiter<CallerId, DashMapStateStore<CallerId>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Token-bucket admission per caller.
pub struct RateGate<C: Clock = DefaultClock> {
    limiter: Option<KeyedLimiter<C>>,
    privileged: HashSet<CallerId>,
    clock: C,
}

impl RateGate<DefaultClock> {
    /// Gate allowing `calls` per `period` on the system clock.
    pub fn new(calls: u32, period: Duration, privileged: impl IntoIterator<Item = CallerId>) -> Self {
        Self::with_clock(calls, period, privileged, DefaultClock::default())
    }
}

impl<C: Clock + Clone> RateGate<C> {
    /// Gate driven by `clock`.
    pub fn with_clock(
        calls: u32,
        period: Duration,
        privileged: impl IntoIterator<Item = CallerId>,
        clock: C,
    ) -> Self {
        let limiter = quota(calls, period)
            .map(|q| RateLimiter::new(q, DashMapStateStore::default(), clock.clone()));
        Self {
            limiter,
            privileged: privileged.into_iter().collect(),
            clock,
        }
    }

    /// Deducts one call for `caller`, or reports how long until one is available.
    pub fn try_acquire(&self, caller: CallerId) -> Result<(), Duration> {
        if self.privileged.contains(&caller) {
            return Ok(());
        }
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter
            .check_key(&caller)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// [`try_acquire`](Self::try_acquire) mapped to [`OrchestratorError::RateLimited`].
    pub fn check(&self, caller: CallerId) -> Result<(), OrchestratorError> {
        self.try_acquire(caller).map_err(|retry_after| {
            tracing::debug!(caller = caller.0, ?retry_after, "rate limited");
            OrchestratorError::RateLimited {
                caller,
                retry_after,
            }
        })
    }

    /// Whether `caller` bypasses the gate.
    pub fn is_privileged(&self, caller: CallerId) -> bool {
        self.privileged.contains(&caller)
    }

    /// Drops bucket state for callers whose buckets are full again.
    pub fn retain_recent(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
        }
    }
}

fn quota(calls: u32, period: Duration) -> Option<Quota> {
    let burst = NonZeroU32::new(calls)?;
    let cell = period
        .checked_div(calls)
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_nanos(1));
    Quota::with_period(cell).map(|q| q.allow_burst(burst))
}
