//! # castvisor
//!
//! **Castvisor** supervises many concurrent live-media push sessions. Each
//! session drives one external encoder process (ffmpeg) that reads a local file
//! or stream URL and publishes it to an RTMP endpoint.
//!
//! The crate owns the control plane only: lifecycle, restarts, playlists,
//! quality selection, admission and notifications. Chat front-ends, upload
//! handling and media processing live elsewhere.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller A        caller B        caller C
//!      │               │               │
//!      ▼               ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - RateGate      (per-caller token buckets, privileged bypass)    │
//! │  - Registry      (sessions, concurrency caps, actor handles)      │
//! │  - PlaylistQueue (per-owner backlog, loop/auto-advance)           │
//! │  - Bus + SubscriberSet (notifications)                            │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   SessionActor       SessionActor       SessionActor
//!   ├─ SourceResolver  (path / url check)
//!   ├─ QualityController (tier + load adaptation)
//!   ├─ Launcher ─► Encoder (ffmpeg child, diagnostics, SIGSTOP/SIGCONT/SIGTERM)
//!   └─ RestartPolicy   (cap + backoff)
//!        │
//!        ▼ publish(Event)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └────────────────────────────┬──────────────────────────────────────┘
//!                              ▼
//!                   listener ─► SubscriberSet ─► Subscribe::on_event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! create ─► PENDING ─start─► STARTING ─connected/grace─► RUNNING ⇄ PAUSED
//!                               │                           │
//!                               ├─ crash ─► CRASHED ─► RESTARTING ─► STARTING
//!                               │                 └─ cap reached ─► STOPPED
//!                               └─ stop ─────────────────────────► STOPPED
//! RUNNING ─ source exhausted ─► PENDING(next item) ─► STARTING
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                          |
//! |-------------------|---------------------------------------------------------|---------------------------------------------|
//! | **Control**       | Create, start, stop, pause, resume, status per caller.  | [`Orchestrator`], [`SessionSpec`]           |
//! | **Policies**      | Restart cap and backoff between restarts.               | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Quality**       | Tier table, overrides, load-driven downgrade.           | [`Tier`], [`QualityRequest`], [`LoadSource`]|
//! | **Playlists**     | Per-owner queue with loop and skip of dead items.       | [`PlaylistQueue`], [`PlaylistEntry`]        |
//! | **Encoders**      | Process launcher seam and the ffmpeg implementation.    | [`Launcher`], [`Encoder`], [`FfmpegLauncher`]|
//! | **Notifications** | Lifecycle events fanned out to subscribers.             | [`Event`], [`Subscribe`], [`LogWriter`]     |
//! | **Persistence**   | Session and playlist records.                           | [`SessionStore`], [`MemoryStore`]           |
//! | **Configuration** | Defaults plus environment overrides.                    | [`Config`]                                  |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use castvisor::{CallerId, Config, LogWriter, Orchestrator, QualityRequest, RtmpTarget, SessionSpec, Tier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::builder(Config::from_env()?)
//!         .with_subscriber(Arc::new(LogWriter))
//!         .build();
//!
//!     let me = CallerId(42);
//!     orch.enqueue(me, "/media/part1.mp4").await?;
//!     orch.enqueue(me, "/media/part2.mp4").await?;
//!
//!     let target = RtmpTarget::new("rtmp://live.example/app", "key-1234");
//!     let session = orch
//!         .create_from_playlist(me, target, Some(QualityRequest::tier(Tier::P1080)), true)
//!         .await?;
//!     orch.start(me, session.id).await?;
//!
//!     let report = orch.run_until_signal().await?;
//!     println!("stopped {} sessions", report.stopped.len());
//!     Ok(())
//! }
//! ```

mod admission;
mod config;
mod core;
mod encoder;
mod error;
mod events;
mod playlist;
mod policies;
mod quality;
mod source;
mod store;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use admission::RateGate;
pub use config::Config;
pub use crate::core::{
    CallerId, Orchestrator, OrchestratorBuilder, SessionId, SessionRecord, SessionSpec, SessionState,
    SessionStatus, StopReport,
};
pub use encoder::{
    mask, Encoder, EncoderEvent, ExitOutcome, FfmpegEncoder, FfmpegLauncher, LaunchSpec, Launcher, RtmpTarget,
    StreamKey,
};
pub use error::{CapacityScope, ConfigError, LaunchError, OrchestratorError, SourceError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use playlist::{PlaylistEntry, PlaylistQueue};
pub use policies::{BackoffPolicy, JitterPolicy, RestartDecision, RestartPolicy};
pub use quality::{
    Bitrate, FixedLoad, LoadAverage, LoadSource, NoLoad, Quality, QualityController, QualityRequest, Resolved, Tier,
};
pub use source::{is_stream_url, LocalResolver, SourceResolver, STREAM_SCHEMES};
pub use store::{MemoryStore, SessionStore};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
