//! # SessionActor: the supervised task behind one session.
//!
//! One actor runs per started session. It owns at most one encoder at a time and
//! is the only writer of the session's lifecycle state while it runs.
//!
//! ## Flow
//! ```text
//! loop {
//!   Launch ─► resolve source ─► resolve quality ─► launcher.launch()
//!     │            │ Err                               │ Err → Crash
//!     │            └──────────► SourceFailed           ▼
//!     │                                            supervise(encoder)
//!     │                                              ├─ Connected / grace  → RUNNING
//!     │                                              ├─ Fatal / crash exit → Crash
//!     │                                              ├─ exhausted exit     → Exhausted
//!     │                                              └─ cancel             → STOPPING → STOPPED
//!   Crash        ─► CRASHED ─► policy ─► RESTARTING ─► sleep(backoff) ─► STARTING ─► Launch
//!                                   └─► give up ─► STOPPED
//!   SourceFailed ─► CRASHED ─► next queued item ? PENDING ─► STARTING ─► Launch : STOPPED
//!   Exhausted    ─► next item (or loop) ? PENDING ─► STARTING ─► Launch : STOPPED
//! }
//! ```
//!
//! ## Rules
//! - Cancellation is observed at every wait (resolve, launch, supervise, backoff).
//! - Pause/resume commands are only honored while an encoder is live; at every
//!   other wait they are answered with `InvalidTransition`.
//! - Source failures never consume a restart.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::context::SessionContext;
use crate::core::slot::{Command, SessionSlot};
use crate::core::state::SessionState;
use crate::encoder::{Encoder, EncoderEvent, ExitOutcome, LaunchSpec};
use crate::error::{OrchestratorError, SourceError};
use crate::events::{Event, EventKind};
use crate::policies::RestartDecision;

/// What the actor does next.
enum Next {
    Launch,
    Crash(String),
    SourceFailed(SourceError),
    Exhausted,
    Finished,
}

pub(crate) struct SessionActor {
    slot: Arc<SessionSlot>,
    ctx: Arc<SessionContext>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    source_failures: usize,
}

impl SessionActor {
    /// Creates an actor for a session already moved to `STARTING`.
    pub fn new(
        slot: Arc<SessionSlot>,
        ctx: Arc<SessionContext>,
        commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slot,
            ctx,
            commands,
            cancel,
            source_failures: 0,
        }
    }

    /// Drives the session until it reaches `STOPPED`.
    pub async fn run(mut self) {
        let mut next = Next::Launch;
        loop {
            next = match next {
                Next::Launch => self.launch().await,
                Next::Crash(reason) => self.crashed(reason).await,
                Next::SourceFailed(err) => self.source_failed(err).await,
                Next::Exhausted => self.exhausted().await,
                Next::Finished => break,
            };
        }

        if !self.slot.state().is_terminal() {
            tracing::error!(session = %self.slot.id.short(), state = %self.slot.state(), "actor ended outside STOPPED");
            self.slot.force_stopped("session actor ended unexpectedly");
            self.publish(self.event(EventKind::SessionStopped));
            self.persist().await;
        }

        self.commands.close();
        while let Ok(cmd) = self.commands.try_recv() {
            let err = self.slot.invalid(cmd.target());
            cmd.reply(Err(err));
        }
    }

    async fn launch(&mut self) -> Next {
        let ctx = Arc::clone(&self.ctx);
        let (source, target, request, restarts) = self
            .slot
            .read(|s| (s.source.clone(), s.target.clone(), s.request, s.restart_count));

        self.publish(self.event(EventKind::SessionStarting).with_attempt(restarts));
        self.persist().await;

        let input = match self.guarded(ctx.resolver.resolve(&source)).await {
            None => return self.stop(None).await,
            Some(Err(err)) => return Next::SourceFailed(err),
            Some(Ok(input)) => input,
        };

        let resolved = ctx.quality.resolve(&request, ctx.load.sample());
        self.slot.update(|s| s.quality = Some(resolved.quality));
        if let Some(from) = resolved.downgraded_from {
            tracing::info!(
                session = %self.slot.id.short(),
                from = %from,
                to = %resolved.quality.tier,
                "quality downgraded for launch"
            );
            self.publish(
                self.event(EventKind::QualityDowngraded)
                    .with_reason(format!("{from} -> {}", resolved.quality.tier)),
            );
        }

        let spec = LaunchSpec {
            session: self.slot.id,
            input,
            target,
            quality: resolved.quality,
            realtime: ctx.realtime,
        };
        match self.guarded(ctx.launcher.launch(&spec)).await {
            None => self.stop(None).await,
            Some(Err(err)) => Next::Crash(err.to_string()),
            Some(Ok(encoder)) => self.supervise(encoder).await,
        }
    }

    async fn supervise(&mut self, mut encoder: Box<dyn Encoder>) -> Next {
        let grace = tokio::time::sleep(self.ctx.start_grace);
        tokio::pin!(grace);
        let mut confirmed = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return self.stop(Some(encoder.as_mut())).await;
                }
                _ = &mut grace, if !confirmed => {
                    confirmed = true;
                    self.confirm_running("start grace elapsed").await;
                }
                ev = encoder.next_event() => match ev {
                    Some(EncoderEvent::Connected) => {
                        if !confirmed {
                            confirmed = true;
                            self.confirm_running("connection established").await;
                        }
                    }
                    Some(EncoderEvent::Exhausted) => {}
                    Some(EncoderEvent::Fatal(line)) => {
                        encoder.terminate(true, self.ctx.stop_timeout).await;
                        return Next::Crash(line);
                    }
                    Some(EncoderEvent::Exited(ExitOutcome::Exhausted)) => {
                        return match self.slot.state() {
                            SessionState::Running => Next::Exhausted,
                            SessionState::Paused => Next::Crash("encoder exited while paused".into()),
                            _ => Next::Crash("encoder exited before confirming the connection".into()),
                        };
                    }
                    Some(EncoderEvent::Exited(ExitOutcome::Crashed { reason })) => {
                        return Next::Crash(reason);
                    }
                    None => {
                        encoder.terminate(false, self.ctx.stop_timeout).await;
                        return Next::Crash("encoder event stream closed".into());
                    }
                },
                Some(cmd) = self.commands.recv() => {
                    self.command(cmd, encoder.as_mut()).await;
                }
            }
        }
    }

    async fn confirm_running(&mut self, via: &'static str) {
        let now = Instant::now();
        let res = self.slot.transition_with(SessionState::Running, |s| {
            s.running_since = Some(now);
            s.last_error = None;
        });
        if let Err(err) = res {
            tracing::error!(session = %self.slot.id.short(), %err, "cannot enter RUNNING");
            return;
        }
        self.source_failures = 0;

        let quality = self
            .slot
            .read(|s| s.quality.map(|q| q.to_string()))
            .unwrap_or_default();
        tracing::info!(session = %self.slot.id.short(), owner = self.slot.owner.0, via, %quality, "session running");
        self.publish(self.event(EventKind::SessionStarted).with_reason(quality));
        self.persist().await;
    }

    async fn command(&mut self, cmd: Command, encoder: &mut dyn Encoder) {
        let to = cmd.target();
        let from = self.slot.state();
        let allowed = matches!(
            (from, to),
            (SessionState::Running, SessionState::Paused) | (SessionState::Paused, SessionState::Running)
        );
        if !allowed {
            let err = self.slot.invalid(to);
            cmd.reply(Err(err));
            return;
        }

        let signalled = match to {
            SessionState::Paused => encoder.pause(),
            _ => encoder.resume(),
        };
        if let Err(err) = signalled {
            tracing::warn!(session = %self.slot.id.short(), %err, "encoder did not accept {to}");
            cmd.reply(Err(OrchestratorError::EncoderCrash {
                reason: err.to_string(),
            }));
            return;
        }

        match self.slot.transition(to) {
            Ok(_) => {
                let kind = match to {
                    SessionState::Paused => EventKind::SessionPaused,
                    _ => EventKind::SessionResumed,
                };
                self.publish(self.event(kind));
                self.persist().await;
                cmd.reply(Ok(()));
            }
            Err(err) => cmd.reply(Err(err)),
        }
    }

    async fn crashed(&mut self, reason: String) -> Next {
        let restarts = self.slot.read(|s| s.restart_count);
        let res = self.slot.transition_with(SessionState::Crashed, |s| {
            s.last_error = Some(reason.clone());
        });
        if let Err(err) = res {
            tracing::error!(session = %self.slot.id.short(), %err, "cannot enter CRASHED");
            return self.finish(Some(reason)).await;
        }

        tracing::warn!(session = %self.slot.id.short(), restarts, %reason, "encoder crashed");
        self.publish(
            self.event(EventKind::SessionCrashed)
                .with_attempt(restarts)
                .with_reason(reason.as_str()),
        );
        self.persist().await;

        match self.ctx.restart.decide(restarts) {
            RestartDecision::GiveUp => {
                let err = OrchestratorError::RestartLimitExceeded {
                    id: self.slot.id,
                    restarts,
                    last_error: reason.clone(),
                };
                tracing::warn!(session = %self.slot.id.short(), %err, "giving up");
                self.publish(
                    self.event(EventKind::RestartLimitExceeded)
                        .with_attempt(restarts)
                        .with_reason(err.to_string()),
                );
                self.finish(Some(reason)).await
            }
            RestartDecision::Retry { delay } => {
                let attempt = restarts + 1;
                if let Err(err) =
                    self.slot.transition_with(SessionState::Restarting, |s| s.restart_count = attempt)
                {
                    tracing::error!(session = %self.slot.id.short(), %err, "cannot enter RESTARTING");
                    return self.finish(Some(reason)).await;
                }
                tracing::info!(
                    session = %self.slot.id.short(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "restart scheduled"
                );
                self.publish(
                    self.event(EventKind::RestartScheduled)
                        .with_attempt(attempt)
                        .with_delay(delay)
                        .with_reason(reason.as_str()),
                );
                self.persist().await;

                match self.guarded(tokio::time::sleep(delay)).await {
                    None => self.finish(None).await,
                    Some(()) => self.enter_starting().await,
                }
            }
        }
    }

    async fn source_failed(&mut self, err: SourceError) -> Next {
        let reason = OrchestratorError::from(err).to_string();
        let res = self.slot.transition_with(SessionState::Crashed, |s| {
            s.last_error = Some(reason.clone());
        });
        if let Err(err) = res {
            tracing::error!(session = %self.slot.id.short(), %err, "cannot enter CRASHED");
            return self.finish(Some(reason)).await;
        }
        tracing::warn!(session = %self.slot.id.short(), %reason, "source unavailable");
        self.publish(self.event(EventKind::SourceUnavailable).with_reason(reason.as_str()));
        self.persist().await;

        // Every remaining item may be unreachable; stop after one full pass.
        self.source_failures += 1;
        let (owner, looping) = self.slot.read(|s| (s.owner, s.loop_playlist));
        let next = if self.source_failures <= self.ctx.playlist.len(owner) {
            self.ctx.playlist.dequeue_next(owner, looping)
        } else {
            None
        };

        match next {
            Some(next) => {
                self.persist_playlist().await;
                self.advance(next).await
            }
            None => self.finish(Some(reason)).await,
        }
    }

    async fn exhausted(&mut self) -> Next {
        let (owner, looping, current) =
            self.slot.read(|s| (s.owner, s.loop_playlist, s.source.clone()));

        let queued = self.ctx.playlist.dequeue_next(owner, looping);
        if queued.is_some() {
            self.persist_playlist().await;
        }
        match queued.or_else(|| looping.then_some(current)) {
            Some(next) => self.advance(next).await,
            None => {
                tracing::info!(session = %self.slot.id.short(), "source exhausted, nothing queued");
                self.finish(None).await
            }
        }
    }

    /// `RUNNING | CRASHED → PENDING(next) → STARTING`.
    async fn advance(&mut self, next: String) -> Next {
        if let Err(err) = self
            .slot
            .transition_with(SessionState::Pending, |s| s.source = next.clone())
        {
            tracing::error!(session = %self.slot.id.short(), %err, "cannot advance playlist");
            return self.finish(None).await;
        }
        tracing::info!(session = %self.slot.id.short(), source = %next, "advancing to next source");
        self.publish(self.event(EventKind::SourceAdvanced).with_reason(next));
        self.persist().await;
        self.enter_starting().await
    }

    async fn enter_starting(&mut self) -> Next {
        match self.slot.transition(SessionState::Starting) {
            Ok(_) => Next::Launch,
            Err(err) => {
                tracing::error!(session = %self.slot.id.short(), %err, "cannot enter STARTING");
                self.finish(None).await
            }
        }
    }

    /// Stop requested: terminate the encoder (if any) and reach `STOPPED`.
    async fn stop(&mut self, encoder: Option<&mut dyn Encoder>) -> Next {
        if self.slot.state().holds_encoder() && self.slot.transition(SessionState::Stopping).is_ok() {
            self.publish(self.event(EventKind::SessionStopping));
            self.persist().await;
        }
        if let Some(encoder) = encoder {
            encoder.terminate(true, self.ctx.stop_timeout).await;
        }
        self.finish(None).await
    }

    /// Enters `STOPPED`, recording `last_error` when given.
    async fn finish(&mut self, last_error: Option<String>) -> Next {
        let res = self.slot.transition_with(SessionState::Stopped, |s| {
            if let Some(reason) = last_error {
                s.last_error = Some(reason);
            }
        });
        if let Err(err) = res {
            tracing::error!(session = %self.slot.id.short(), %err, "cannot enter STOPPED");
            self.slot.force_stopped(&err.to_string());
        }

        let last = self.slot.read(|s| s.last_error.clone());
        tracing::info!(session = %self.slot.id.short(), last_error = ?last, "session stopped");
        let mut ev = self.event(EventKind::SessionStopped);
        if let Some(reason) = last {
            ev = ev.with_reason(reason);
        }
        self.publish(ev);
        self.persist().await;
        Next::Finished
    }

    /// Awaits `fut` unless cancelled (`None`); commands arriving meanwhile are rejected.
    async fn guarded<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                out = &mut fut => return Some(out),
                Some(cmd) = self.commands.recv() => {
                    let err = self.slot.invalid(cmd.target());
                    cmd.reply(Err(err));
                }
            }
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_session(self.slot.id)
            .with_owner(self.slot.owner)
            .with_state(self.slot.state())
    }

    fn publish(&self, ev: Event) {
        self.ctx.bus.publish(ev);
    }

    async fn persist(&self) {
        let record = self.slot.record();
        if let Err(err) = self.ctx.store.put_session(&record).await {
            tracing::warn!(session = %self.slot.id.short(), %err, "session record not persisted");
        }
    }

    async fn persist_playlist(&self) {
        let owner = self.slot.owner;
        let entries = self.ctx.playlist.list(owner);
        if let Err(err) = self.ctx.store.put_playlist(owner, &entries).await {
            tracing::warn!(owner = owner.0, %err, "playlist not persisted");
        }
    }
}
