//! Session identity, the registry-owned record and its read-only views.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::state::SessionState;
use crate::encoder::RtmpTarget;
use crate::quality::{Quality, QualityRequest};

/// Opaque session identifier. Random v4 UUIDs never repeat within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocates a fresh id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex digits, for log lines.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a controlling caller (chat user id or similar).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(pub u64);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for a new session.
///
/// # Example
/// ```
/// use castvisor::{QualityRequest, RtmpTarget, SessionSpec, Tier};
///
/// let spec = SessionSpec::new("/media/intro.mp4", RtmpTarget::new("rtmp://live.example/app", "key-1234"))
///     .with_quality(QualityRequest::tier(Tier::P1080))
///     .with_loop(true);
/// assert!(spec.loop_playlist);
/// ```
#[derive(Clone, Debug)]
pub struct SessionSpec {
    /// First input: local path or stream URL.
    pub source: String,
    /// Push destination.
    pub target: RtmpTarget,
    /// Requested quality; `None` uses the configured default.
    pub quality: Option<QualityRequest>,
    /// Wrap the playlist when it runs out.
    pub loop_playlist: bool,
}

impl SessionSpec {
    /// Spec with default quality and no looping.
    pub fn new(source: impl Into<String>, target: RtmpTarget) -> Self {
        Self {
            source: source.into(),
            target,
            quality: None,
            loop_playlist: false,
        }
    }

    /// Sets the requested quality.
    pub fn with_quality(mut self, quality: QualityRequest) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Enables or disables playlist looping.
    pub fn with_loop(mut self, on: bool) -> Self {
        self.loop_playlist = on;
        self
    }
}

/// Mutable session record. Only the registry and the session's own actor write it.
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub id: SessionId,
    pub owner: CallerId,
    pub source: String,
    pub target: RtmpTarget,
    pub request: QualityRequest,
    pub quality: Option<Quality>,
    pub state: SessionState,
    pub restart_count: u32,
    pub last_error: Option<String>,
    pub loop_playlist: bool,
    pub created_at: SystemTime,
    pub running_since: Option<Instant>,
}

impl Session {
    pub fn new(id: SessionId, owner: CallerId, spec: SessionSpec, request: QualityRequest) -> Self {
        Self {
            id,
            owner,
            source: spec.source,
            target: spec.target,
            request,
            quality: None,
            state: SessionState::Pending,
            restart_count: 0,
            last_error: None,
            loop_playlist: spec.loop_playlist,
            created_at: SystemTime::now(),
            running_since: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id,
            owner: self.owner,
            state: self.state,
            source: self.source.clone(),
            target: self.target.to_string(),
            requested: self.request,
            quality: self.quality,
            uptime: self.running_since.map(|t| t.elapsed()),
            restart_count: self.restart_count,
            last_error: self.last_error.clone(),
            loop_playlist: self.loop_playlist,
            created_at: self.created_at,
        }
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            owner: self.owner,
            source: self.source.clone(),
            target: self.target.clone(),
            quality: self.request,
            loop_playlist: self.loop_playlist,
            state: self.state,
            restart_count: self.restart_count,
            last_error: self.last_error.clone(),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Clone, Debug)]
pub struct SessionStatus {
    /// Session id.
    pub id: SessionId,
    /// Controlling caller.
    pub owner: CallerId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Current input.
    pub source: String,
    /// Destination with the key masked.
    pub target: String,
    /// Quality the caller asked for.
    pub requested: QualityRequest,
    /// Quality of the current or last launch.
    pub quality: Option<Quality>,
    /// Time since the encoder was last confirmed running; `None` when not running.
    pub uptime: Option<Duration>,
    /// Automatic restarts since the last manual start.
    pub restart_count: u32,
    /// Most recent failure.
    pub last_error: Option<String>,
    /// Playlist loop flag.
    pub loop_playlist: bool,
    /// Creation time.
    pub created_at: SystemTime,
}

/// Minimal durable session record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id.
    pub id: SessionId,
    /// Controlling caller.
    pub owner: CallerId,
    /// Current input.
    pub source: String,
    /// Destination including the raw key.
    pub target: RtmpTarget,
    /// Requested quality.
    pub quality: QualityRequest,
    /// Playlist loop flag.
    pub loop_playlist: bool,
    /// Last persisted state.
    pub state: SessionState,
    /// Restarts since the last manual start.
    pub restart_count: u32,
    /// Most recent failure.
    pub last_error: Option<String>,
}
