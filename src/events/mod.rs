//! Orchestrator events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Registry` (created), `SessionActor` (every transition),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the orchestrator's fan-out listener (feeds `SubscriberSet`)
//!   and receivers handed out by `Orchestrator::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
