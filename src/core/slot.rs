//! Registry entry for one session: the record plus its control path.
//!
//! ```text
//! SessionSlot
//!   ├─ record : parking_lot::RwLock<Session>   short, sync critical sections; status() reads it
//!   └─ control: tokio::Mutex<Control>          held across a whole control operation
//!                └─ actor: Option<ActorHandle { cancel, commands, join }>
//! ```
//!
//! Every caller-facing operation on a session holds `control` for its duration,
//! so operations on the same session are serialized. The actor writes `record`
//! through [`SessionSlot::transition`], which enforces the lifecycle graph.

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::session::{CallerId, Session, SessionId, SessionRecord, SessionStatus};
use crate::core::state::SessionState;
use crate::error::OrchestratorError;

/// Reply channel for actor commands.
pub(crate) type Reply = oneshot::Sender<Result<(), OrchestratorError>>;

/// Requests the registry forwards to a live actor.
#[derive(Debug)]
pub(crate) enum Command {
    Pause(Reply),
    Resume(Reply),
}

impl Command {
    pub fn target(&self) -> SessionState {
        match self {
            Command::Pause(_) => SessionState::Paused,
            Command::Resume(_) => SessionState::Running,
        }
    }

    pub fn reply(self, result: Result<(), OrchestratorError>) {
        let tx = match self {
            Command::Pause(tx) | Command::Resume(tx) => tx,
        };
        let _ = tx.send(result);
    }
}

pub(crate) struct ActorHandle {
    pub cancel: CancellationToken,
    pub commands: mpsc::Sender<Command>,
    pub join: JoinHandle<()>,
}

impl ActorHandle {
    pub fn is_live(&self) -> bool {
        !self.join.is_finished()
    }
}

#[derive(Default)]
pub(crate) struct Control {
    pub actor: Option<ActorHandle>,
}

pub(crate) struct SessionSlot {
    pub id: SessionId,
    pub owner: CallerId,
    record: parking_lot::RwLock<Session>,
    pub control: Mutex<Control>,
}

impl SessionSlot {
    pub fn new(session: Session) -> Self {
        Self {
            id: session.id,
            owner: session.owner,
            record: parking_lot::RwLock::new(session),
            control: Mutex::new(Control::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.record.read().state
    }

    pub fn status(&self) -> SessionStatus {
        self.record.read().status()
    }

    pub fn record(&self) -> SessionRecord {
        self.record.read().record()
    }

    /// Reads a field of the record.
    pub fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&self.record.read())
    }

    /// Mutates non-state fields of the record.
    pub fn update<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.record.write())
    }

    /// Moves to `to` if the lifecycle graph allows it, then applies `f`.
    ///
    /// Returns the previous state. On rejection the record is unchanged.
    pub fn transition_with(
        &self,
        to: SessionState,
        f: impl FnOnce(&mut Session),
    ) -> Result<SessionState, OrchestratorError> {
        let mut rec = self.record.write();
        let from = rec.state;
        if !from.can_transition(to) {
            return Err(OrchestratorError::InvalidTransition {
                id: self.id,
                from,
                to,
            });
        }
        rec.state = to;
        if !to.holds_encoder() && to != SessionState::Stopping {
            rec.running_since = None;
        }
        f(&mut rec);
        Ok(from)
    }

    pub fn transition(&self, to: SessionState) -> Result<SessionState, OrchestratorError> {
        self.transition_with(to, |_| {})
    }

    /// Forces `STOPPED` regardless of the current state. Used only when the
    /// session's actor died without reaching it.
    pub fn force_stopped(&self, reason: &str) {
        let mut rec = self.record.write();
        rec.state = SessionState::Stopped;
        rec.running_since = None;
        rec.last_error = Some(reason.to_string());
    }

    pub fn invalid(&self, to: SessionState) -> OrchestratorError {
        OrchestratorError::InvalidTransition {
            id: self.id,
            from: self.state(),
            to,
        }
    }
}
