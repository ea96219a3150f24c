//! # Lifecycle events emitted by the registry and session actors.
//!
//! [`EventKind`] falls into three groups:
//! - **Lifecycle**: a session moved through its state machine (created, started, stopped, ...)
//! - **Recovery**: crash handling, playlist advancement and quality adaptation
//! - **Subscriber**: problems inside the notification fan-out itself
//!
//! [`Event`] carries the metadata (session, owner, state, attempt, delay, reason).
//! Events never contain the raw stream key and never contain user-facing text;
//! formatting is left to subscribers.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use castvisor::{CallerId, Event, EventKind, SessionId};
//!
//! let id = SessionId::new();
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_session(id)
//!     .with_owner(CallerId(7))
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(10))
//!     .with_reason("Connection refused");
//!
//! assert_eq!(ev.session, Some(id));
//! assert_eq!(ev.delay_ms, Some(10_000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::{CallerId, SessionId, SessionState};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of orchestrator events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle ===
    /// Session allocated in `PENDING`.
    ///
    /// Sets: `session`, `owner`, `state`
    SessionCreated,

    /// An encoder launch is under way.
    ///
    /// Sets: `session`, `owner`, `state`, `attempt` (restart count)
    SessionStarting,

    /// The encoder is confirmed live.
    ///
    /// Sets: `session`, `owner`, `state`, `reason` (effective quality)
    SessionStarted,

    /// Encoder suspended.
    ///
    /// Sets: `session`, `owner`, `state`
    SessionPaused,

    /// Encoder continued.
    ///
    /// Sets: `session`, `owner`, `state`
    SessionResumed,

    /// Stop requested; the encoder is being terminated.
    ///
    /// Sets: `session`, `owner`, `state`
    SessionStopping,

    /// Session reached `STOPPED`.
    ///
    /// Sets: `session`, `owner`, `state`, `reason` (last error, if any)
    SessionStopped,

    // === Recovery ===
    /// The encoder failed.
    ///
    /// Sets: `session`, `owner`, `state`, `attempt`, `reason`
    SessionCrashed,

    /// A restart is scheduled after a crash.
    ///
    /// Sets: `session`, `owner`, `state`, `attempt` (restart number, 1-based), `delay_ms`, `reason`
    RestartScheduled,

    /// Restart cap reached; the session stopped.
    ///
    /// Sets: `session`, `owner`, `state`, `attempt`, `reason` (last error)
    RestartLimitExceeded,

    /// Current input finished (or was skipped); the next one is queued.
    ///
    /// Sets: `session`, `owner`, `reason` (next input)
    SourceAdvanced,

    /// An input could not be acquired.
    ///
    /// Sets: `session`, `owner`, `reason`
    SourceUnavailable,

    /// Launch quality lowered because of system load.
    ///
    /// Sets: `session`, `owner`, `reason` (`720p -> 480p`)
    QualityDowngraded,

    // === Subscriber ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subscriber`, `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `subscriber`, `reason`
    SubscriberPanicked,
}

impl EventKind {
    /// Short kebab-case tag for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SessionCreated => "created",
            EventKind::SessionStarting => "starting",
            EventKind::SessionStarted => "started",
            EventKind::SessionPaused => "paused",
            EventKind::SessionResumed => "resumed",
            EventKind::SessionStopping => "stopping",
            EventKind::SessionStopped => "stopped",
            EventKind::SessionCrashed => "crashed",
            EventKind::RestartScheduled => "restart-scheduled",
            EventKind::RestartLimitExceeded => "restart-limit-exceeded",
            EventKind::SourceAdvanced => "source-advanced",
            EventKind::SourceUnavailable => "source-unavailable",
            EventKind::QualityDowngraded => "quality-downgraded",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::SubscriberPanicked => "subscriber-panicked",
        }
    }
}

/// Orchestrator event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Session the event is about.
    pub session: Option<SessionId>,
    /// Owner of that session.
    pub owner: Option<CallerId>,
    /// Session state after the transition.
    pub state: Option<SessionState>,
    /// Restart number or attempt count.
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Machine-oriented detail (error text, next input, quality change).
    pub reason: Option<Arc<str>>,
    /// Subscriber name for fan-out events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            session: None,
            owner: None,
            state: None,
            attempt: None,
            delay_ms: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches the session id.
    #[inline]
    pub fn with_session(mut self, id: SessionId) -> Self {
        self.session = Some(id);
        self
    }

    /// Attaches the owner.
    #[inline]
    pub fn with_owner(mut self, owner: CallerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attaches the state entered.
    #[inline]
    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow).with_reason(reason);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// True for events raised by the fan-out itself.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
