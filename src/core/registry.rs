//! # Session registry: the owner of every session and its actor.
//!
//! ```text
//! create ──► capacity check (write lock) ──► SessionSlot{PENDING} ──► SessionCreated
//! start  ──► control lock ──► PENDING → STARTING ──► spawn SessionActor(child token)
//! stop   ──► control lock ──► cancel actor ──► join ──► STOPPED
//!                         └─► no actor: PENDING → STOPPED
//! pause  ──► control lock ──► Command::Pause ──► actor ──► reply
//! resume ──► control lock ──► Command::Resume ──► actor ──► reply
//! ```
//!
//! ## Rules
//! - Capacity is checked and the slot inserted under one write lock, so
//!   concurrent creates cannot both take the last slot.
//! - A rejected create allocates no id.
//! - Control operations on one session are serialized by its control lock.
//! - Each started session gets a child of the runtime token; cancelling the
//!   runtime token stops every actor.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::actor::SessionActor;
use crate::core::context::SessionContext;
use crate::core::session::{CallerId, Session, SessionId, SessionSpec, SessionStatus};
use crate::core::slot::{ActorHandle, Command, Reply, SessionSlot};
use crate::core::state::SessionState;
use crate::error::{CapacityScope, OrchestratorError};
use crate::events::{Event, EventKind};
use crate::quality::QualityRequest;

/// Pending pause/resume commands per actor.
const COMMAND_QUEUE: usize = 8;

/// Outcome of a bulk stop.
#[derive(Debug, Default)]
pub struct StopReport {
    /// Sessions that reached `STOPPED`.
    pub stopped: Vec<SessionId>,
    /// Sessions that could not be stopped, with the reason.
    pub failed: Vec<(SessionId, OrchestratorError)>,
}

impl StopReport {
    /// True if every targeted session stopped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub(crate) struct Registry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
    ctx: Arc<SessionContext>,
    global_limit: Option<usize>,
    owner_limit: Option<usize>,
    runtime_token: CancellationToken,
}

impl Registry {
    pub fn new(
        ctx: Arc<SessionContext>,
        global_limit: Option<usize>,
        owner_limit: Option<usize>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ctx,
            global_limit,
            owner_limit,
            runtime_token,
        }
    }

    /// Registers a new `PENDING` session.
    pub async fn create(
        &self,
        owner: CallerId,
        spec: SessionSpec,
        request: QualityRequest,
    ) -> Result<SessionStatus, OrchestratorError> {
        self.ensure_open()?;
        let slot = {
            let mut sessions = self.sessions.write().await;

            let (mut total, mut owned) = (0usize, 0usize);
            for s in sessions.values().filter(|s| s.state().occupies_slot()) {
                total += 1;
                if s.owner == owner {
                    owned += 1;
                }
            }
            if let Some(limit) = self.owner_limit.filter(|&l| owned >= l) {
                return Err(OrchestratorError::CapacityExceeded {
                    scope: CapacityScope::Owner(owner),
                    limit,
                });
            }
            if let Some(limit) = self.global_limit.filter(|&l| total >= l) {
                return Err(OrchestratorError::CapacityExceeded {
                    scope: CapacityScope::Global,
                    limit,
                });
            }

            let slot = Arc::new(SessionSlot::new(Session::new(
                SessionId::new(),
                owner,
                spec,
                request,
            )));
            sessions.insert(slot.id, Arc::clone(&slot));
            slot
        };

        tracing::info!(session = %slot.id.short(), owner = owner.0, "session created");
        self.publish(&slot, EventKind::SessionCreated);
        self.persist(&slot).await;
        Ok(slot.status())
    }

    fn ensure_open(&self) -> Result<(), OrchestratorError> {
        if self.runtime_token.is_cancelled() {
            return Err(OrchestratorError::ShuttingDown);
        }
        Ok(())
    }

    /// Launches the session's actor. Only valid from `PENDING`.
    pub async fn start(&self, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        let slot = self.slot(id).await?;
        let mut control = slot.control.lock().await;

        self.ensure_open()?;
        if control.actor.as_ref().is_some_and(ActorHandle::is_live) {
            return Err(slot.invalid(SessionState::Starting));
        }
        slot.transition_with(SessionState::Starting, |s| {
            s.restart_count = 0;
            s.last_error = None;
        })?;

        let cancel = self.runtime_token.child_token();
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let actor = SessionActor::new(Arc::clone(&slot), Arc::clone(&self.ctx), rx, cancel.clone());
        let join = tokio::spawn(actor.run());
        control.actor = Some(ActorHandle {
            cancel,
            commands: tx,
            join,
        });

        Ok(slot.status())
    }

    /// Stops the session and waits until it reaches `STOPPED`.
    pub async fn stop(&self, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        let slot = self.slot(id).await?;
        let mut control = slot.control.lock().await;

        if slot.state().is_terminal() {
            return Err(slot.invalid(SessionState::Stopped));
        }

        match control.actor.take() {
            Some(actor) => {
                actor.cancel.cancel();
                drop(actor.commands);
                if let Err(err) = actor.join.await {
                    tracing::error!(session = %slot.id.short(), %err, "session actor failed");
                    slot.force_stopped("session actor panicked");
                    self.publish(&slot, EventKind::SessionStopped);
                    self.persist(&slot).await;
                }
            }
            None => {
                slot.transition(SessionState::Stopped)?;
                tracing::info!(session = %slot.id.short(), "session stopped before start");
                self.publish(&slot, EventKind::SessionStopped);
                self.persist(&slot).await;
            }
        }

        Ok(slot.status())
    }

    /// Suspends a `RUNNING` session.
    pub async fn pause(&self, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.command(id, Command::Pause).await
    }

    /// Continues a `PAUSED` session.
    pub async fn resume(&self, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.command(id, Command::Resume).await
    }

    async fn command(
        &self,
        id: SessionId,
        make: fn(Reply) -> Command,
    ) -> Result<SessionStatus, OrchestratorError> {
        let slot = self.slot(id).await?;
        let control = slot.control.lock().await;

        let (tx, rx) = oneshot::channel();
        let cmd = make(tx);
        let to = cmd.target();
        let required = match to {
            SessionState::Paused => SessionState::Running,
            _ => SessionState::Paused,
        };
        if slot.state() != required {
            return Err(slot.invalid(to));
        }
        let Some(actor) = control.actor.as_ref() else {
            return Err(slot.invalid(to));
        };
        if actor.commands.send(cmd).await.is_err() {
            return Err(slot.invalid(to));
        }
        match rx.await {
            Ok(res) => res?,
            Err(_) => return Err(slot.invalid(to)),
        }
        drop(control);

        Ok(slot.status())
    }

    /// Stops every non-terminal session, optionally only those of `owner`.
    ///
    /// Best effort: one failure does not abort the batch.
    pub async fn stop_all(&self, owner: Option<CallerId>) -> StopReport {
        let targets: Vec<SessionId> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| owner.map_or(true, |o| s.owner == o))
                .filter(|s| !s.state().is_terminal())
                .map(|s| s.id)
                .collect()
        };

        let results = join_all(targets.into_iter().map(|id| async move { (id, self.stop(id).await) })).await;

        let mut report = StopReport::default();
        for (id, res) in results {
            match res {
                Ok(_) => report.stopped.push(id),
                // Reached STOPPED on its own between the snapshot and the stop.
                Err(OrchestratorError::InvalidTransition {
                    from: SessionState::Stopped,
                    ..
                }) => report.stopped.push(id),
                Err(err) => report.failed.push((id, err)),
            }
        }
        report
    }

    /// Snapshot of sessions ordered by creation time, optionally filtered by owner.
    pub async fn status(&self, owner: Option<CallerId>) -> Vec<SessionStatus> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<SessionStatus> = sessions
            .values()
            .filter(|s| owner.map_or(true, |o| s.owner == o))
            .map(|s| s.status())
            .collect();
        out.sort_by_key(|s| (s.created_at, s.id));
        out
    }

    /// Status of one session.
    pub async fn get(&self, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        Ok(self.slot(id).await?.status())
    }

    /// Owner of a session.
    pub async fn owner_of(&self, id: SessionId) -> Result<CallerId, OrchestratorError> {
        Ok(self.slot(id).await?.owner)
    }

    /// Removes a `STOPPED` session from the registry and the store.
    pub async fn forget(&self, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        let slot = {
            let mut sessions = self.sessions.write().await;
            let slot = sessions
                .get(&id)
                .cloned()
                .ok_or(OrchestratorError::NotFound { id })?;
            if !slot.state().is_terminal() {
                return Err(slot.invalid(SessionState::Stopped));
            }
            sessions.remove(&id);
            slot
        };

        if let Err(err) = self.ctx.store.remove_session(id).await {
            tracing::warn!(session = %id.short(), %err, "stored record not removed");
        }
        Ok(slot.status())
    }

    /// Number of sessions occupying a concurrency slot.
    pub async fn active(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| s.state().occupies_slot()).count()
    }

    async fn slot(&self, id: SessionId) -> Result<Arc<SessionSlot>, OrchestratorError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::NotFound { id })
    }

    fn publish(&self, slot: &SessionSlot, kind: EventKind) {
        let mut ev = Event::new(kind)
            .with_session(slot.id)
            .with_owner(slot.owner)
            .with_state(slot.state());
        if let Some(reason) = slot.read(|s| s.last_error.clone()) {
            ev = ev.with_reason(reason);
        }
        self.ctx.bus.publish(ev);
    }

    async fn persist(&self, slot: &SessionSlot) {
        if let Err(err) = self.ctx.store.put_session(&slot.record()).await {
            tracing::warn!(session = %slot.id.short(), %err, "session record not persisted");
        }
    }
}
