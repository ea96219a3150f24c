//! # Orchestrator: the caller-facing control surface.
//!
//! The [`Orchestrator`] owns the event bus, the rate gate, the session registry,
//! the playlist queue and the subscriber fan-out. Every operation names the
//! calling [`CallerId`], passes the rate gate and is then checked for ownership.
//!
//! ## Architecture
//! ```text
//! caller ──► Orchestrator::op(caller, ..)
//!               ├─► RateGate::check(caller)            RateLimited
//!               ├─► ownership (owner or privileged)    NotFound
//!               └─► Registry::op(..)
//!                      └─► SessionActor ─► Launcher ─► encoder process
//!
//! Event flow:
//!   Registry / SessionActor ── publish ──► Bus ──┬──► listener ──► SubscriberSet ──► Subscribe::on_event
//!                                                └──► Orchestrator::subscribe() receivers
//!
//! Shutdown:
//!   shutdown() ──► stop_all(None) ──► runtime_token.cancel() ──► listener drains the bus
//!                                                            └─► SubscriberSet::shutdown()
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use castvisor::{CallerId, Config, LogWriter, Orchestrator, RtmpTarget, SessionSpec};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::builder(Config::from_env()?)
//!         .with_subscriber(Arc::new(LogWriter))
//!         .build();
//!
//!     let me = CallerId(42);
//!     let spec = SessionSpec::new("/media/intro.mp4", RtmpTarget::new("rtmp://live.example/app", "key-1234"));
//!     let created = orch.create(me, spec).await?;
//!     orch.start(me, created.id).await?;
//!
//!     orch.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::RateGate;
use crate::config::Config;
use crate::core::registry::{Registry, StopReport};
use crate::core::session::{CallerId, SessionId, SessionSpec, SessionStatus};
use crate::core::shutdown;
use crate::encoder::RtmpTarget;
use crate::error::{OrchestratorError, SourceError, StoreError};
use crate::events::{Bus, Event};
use crate::playlist::{PlaylistEntry, PlaylistQueue};
use crate::quality::QualityRequest;
use crate::store::SessionStore;
use crate::subscribers::SubscriberSet;

/// Supervises streaming sessions on behalf of many callers.
pub struct Orchestrator {
    cfg: Config,
    gate: Arc<RateGate>,
    registry: Registry,
    playlist: Arc<PlaylistQueue>,
    store: Arc<dyn SessionStore>,
    bus: Bus,
    runtime_token: CancellationToken,
    background: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        cfg: Config,
        gate: Arc<RateGate>,
        registry: Registry,
        playlist: Arc<PlaylistQueue>,
        store: Arc<dyn SessionStore>,
        bus: Bus,
        subs: SubscriberSet,
        runtime_token: CancellationToken,
    ) -> Self {
        let listener = spawn_listener(bus.subscribe(), subs, runtime_token.clone());
        let housekeeping = spawn_housekeeping(Arc::clone(&gate), &cfg, runtime_token.clone());
        Self {
            cfg,
            gate,
            registry,
            playlist,
            store,
            bus,
            runtime_token,
            background: parking_lot::Mutex::new(vec![listener, housekeeping]),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Receiver for every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Registers a new `PENDING` session owned by `caller`.
    ///
    /// Fails with [`OrchestratorError::CapacityExceeded`] when the caller or the
    /// process is at its session cap; no id is allocated in that case.
    pub async fn create(&self, caller: CallerId, spec: SessionSpec) -> Result<SessionStatus, OrchestratorError> {
        self.gate.check(caller)?;
        let request = spec.quality.unwrap_or_else(|| self.cfg.default_request());
        self.registry.create(caller, spec, request).await
    }

    /// Registers a session whose source is the head of the caller's playlist.
    ///
    /// The head entry is consumed only if the session is created.
    pub async fn create_from_playlist(
        &self,
        caller: CallerId,
        target: RtmpTarget,
        quality: Option<QualityRequest>,
        loop_playlist: bool,
    ) -> Result<SessionStatus, OrchestratorError> {
        self.gate.check(caller)?;

        let taken = self
            .playlist
            .take_next(caller, loop_playlist)
            .ok_or_else(|| SourceError::new("playlist", "queue is empty"))?;

        let mut spec = SessionSpec::new(taken.source.clone(), target).with_loop(loop_playlist);
        if let Some(q) = quality {
            spec = spec.with_quality(q);
        }
        let request = spec.quality.unwrap_or_else(|| self.cfg.default_request());
        match self.registry.create(caller, spec, request).await {
            Ok(status) => {
                self.persist_playlist(caller).await;
                Ok(status)
            }
            Err(e) => {
                self.playlist.undo(caller, taken);
                Err(e)
            }
        }
    }

    /// Launches a `PENDING` session.
    pub async fn start(&self, caller: CallerId, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.authorize(caller, id).await?;
        self.registry.start(id).await
    }

    /// Stops a session and waits for it to reach `STOPPED`.
    pub async fn stop(&self, caller: CallerId, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.authorize(caller, id).await?;
        self.registry.stop(id).await
    }

    /// Suspends a `RUNNING` session.
    pub async fn pause(&self, caller: CallerId, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.authorize(caller, id).await?;
        self.registry.pause(id).await
    }

    /// Continues a `PAUSED` session.
    pub async fn resume(&self, caller: CallerId, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.authorize(caller, id).await?;
        self.registry.resume(id).await
    }

    /// Stops every live session of `owner`, or of everyone when `owner` is `None`.
    ///
    /// Non-privileged callers can only stop their own sessions; `owner` is
    /// ignored for them.
    pub async fn stop_all(&self, caller: CallerId, owner: Option<CallerId>) -> Result<StopReport, OrchestratorError> {
        self.gate.check(caller)?;
        let scope = if self.gate.is_privileged(caller) { owner } else { Some(caller) };
        Ok(self.registry.stop_all(scope).await)
    }

    /// Sessions visible to `caller`: all of them for privileged callers, else their own.
    pub async fn status(&self, caller: CallerId) -> Result<Vec<SessionStatus>, OrchestratorError> {
        self.gate.check(caller)?;
        let scope = (!self.gate.is_privileged(caller)).then_some(caller);
        Ok(self.registry.status(scope).await)
    }

    /// Status of one session.
    pub async fn get(&self, caller: CallerId, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.authorize(caller, id).await?;
        self.registry.get(id).await
    }

    /// Drops a `STOPPED` session from the registry and the store.
    pub async fn forget(&self, caller: CallerId, id: SessionId) -> Result<SessionStatus, OrchestratorError> {
        self.authorize(caller, id).await?;
        self.registry.forget(id).await
    }

    /// Appends `source` to the caller's playlist; returns its position.
    pub async fn enqueue(&self, caller: CallerId, source: impl Into<String>) -> Result<usize, OrchestratorError> {
        self.gate.check(caller)?;
        let position = self.playlist.enqueue(caller, source);
        self.persist_playlist(caller).await;
        Ok(position)
    }

    /// Removes the entry at `position` from the caller's playlist.
    pub async fn remove_from_playlist(
        &self,
        caller: CallerId,
        position: usize,
    ) -> Result<Option<PlaylistEntry>, OrchestratorError> {
        self.gate.check(caller)?;
        let removed = self.playlist.remove(caller, position);
        if removed.is_some() {
            self.persist_playlist(caller).await;
        }
        Ok(removed)
    }

    /// Empties the caller's playlist; returns how many entries were dropped.
    pub async fn clear_playlist(&self, caller: CallerId) -> Result<usize, OrchestratorError> {
        self.gate.check(caller)?;
        let cleared = self.playlist.clear(caller);
        self.persist_playlist(caller).await;
        Ok(cleared)
    }

    /// The caller's playlist in order.
    pub async fn playlist(&self, caller: CallerId) -> Result<Vec<PlaylistEntry>, OrchestratorError> {
        self.gate.check(caller)?;
        Ok(self.playlist.list(caller))
    }

    /// Reloads `owner`'s playlist from the store, replacing the in-memory queue.
    pub async fn restore_playlist(&self, owner: CallerId) -> Result<usize, StoreError> {
        let entries = self.store.get_playlist(owner).await?;
        let n = entries.len();
        self.playlist.hydrate(owner, entries);
        tracing::info!(owner = owner.0, entries = n, "playlist restored");
        Ok(n)
    }

    /// Number of sessions currently counted against the caps.
    pub async fn active_sessions(&self) -> usize {
        self.registry.active().await
    }

    /// Stops every session, then drains the subscribers.
    ///
    /// Operations issued after shutdown still work, but events are no longer
    /// delivered to subscribers.
    pub async fn shutdown(&self) -> StopReport {
        let report = self.registry.stop_all(None).await;
        tracing::info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "orchestrator shutting down"
        );
        self.runtime_token.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.background.lock());
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(%err, "background task failed");
            }
        }
        report
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> std::io::Result<StopReport> {
        shutdown::wait_for_shutdown_signal().await?;
        tracing::info!("termination signal received");
        Ok(self.shutdown().await)
    }

    /// Rate gate, then ownership. Sessions of other callers look absent.
    async fn authorize(&self, caller: CallerId, id: SessionId) -> Result<(), OrchestratorError> {
        self.gate.check(caller)?;
        let owner = self.registry.owner_of(id).await?;
        if owner == caller || self.gate.is_privileged(caller) {
            Ok(())
        } else {
            Err(OrchestratorError::NotFound { id })
        }
    }

    async fn persist_playlist(&self, owner: CallerId) {
        let entries = self.playlist.list(owner);
        if let Err(err) = self.store.put_playlist(owner, &entries).await {
            tracing::warn!(owner = owner.0, %err, "playlist not persisted");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

/// Forwards bus events to the subscriber set until the runtime token is cancelled.
fn spawn_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = token.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => set.emit(&ev),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}

/// Periodically drops idle rate-gate buckets.
fn spawn_housekeeping(gate: Arc<RateGate>, cfg: &Config, token: CancellationToken) -> JoinHandle<()> {
    let every = cfg.rate_limit_period.max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => gate.retain_recent(),
            }
        }
    })
}
