//! # Notification sinks.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   SessionActor ── publish(Event) ──► Bus ──► fan-out listener ──► SubscriberSet::emit(&Event)
//!                                                                   │
//!                                                        ┌──────────┼──────────┐
//!                                                        ▼          ▼          ▼
//!                                                    LogWriter   ChatSink    Custom ...
//! ```
//!
//! - [`Subscribe`] the trait hosts implement
//! - [`SubscriberSet`] bounded per-subscriber queues with panic isolation
//! - [`LogWriter`] built-in `tracing` sink

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
