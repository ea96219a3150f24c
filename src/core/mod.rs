//! Runtime core: sessions, their lifecycle and the control surface.
//!
//! The only entry point hosts need is [`Orchestrator`]; the rest are the
//! value types it hands out.
//!
//! Internal modules:
//! - [`state`]: the lifecycle state machine;
//! - [`session`]: ids, specs and status views;
//! - [`slot`]: registry entry (record plus control path);
//! - [`actor`]: supervises one session's encoder, restarts and playlist advance;
//! - [`registry`]: capacity checks and actor spawning;
//! - [`orchestrator`]: rate gate, ownership and subscriber fan-out;
//! - [`shutdown`]: termination signal handling.

mod actor;
mod builder;
mod context;
mod orchestrator;
mod registry;
mod session;
mod shutdown;
mod slot;
mod state;

#[cfg(test)]
mod tests;

pub use builder::OrchestratorBuilder;
pub use orchestrator::Orchestrator;
pub use registry::StopReport;
pub use session::{CallerId, SessionId, SessionRecord, SessionSpec, SessionStatus};
pub use state::SessionState;
