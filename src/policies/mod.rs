//! Restart policies.
//!
//! This module groups the knobs that control **whether** a crashed session is
//! restarted and **how long** it waits first.
//!
//! ## Contents
//! - [`RestartPolicy`] restart cap plus backoff; yields a [`RestartDecision`]
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization to avoid synchronized reconnects
//!
//! ## Quick wiring
//! ```text
//! Config { restart: RestartPolicy, .. }
//!      └─► core::actor::SessionActor on crash:
//!           - restart.decide(restart_count) → Retry { delay } | GiveUp
//! ```
//!
//! ## Defaults
//! - `Config::default().restart` → 5 restarts, first=5s, factor=2.0, max=60s, jitter=None.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::{RestartDecision, RestartPolicy};
