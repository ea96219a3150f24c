//! Error types used by the castvisor orchestrator.
//!
//! [`OrchestratorError`] is the single error surfaced to callers. It carries the
//! full failure taxonomy of the orchestrator:
//!
//! - synchronous rejections with no side effects: [`CapacityExceeded`](OrchestratorError::CapacityExceeded),
//!   [`NotFound`](OrchestratorError::NotFound), [`InvalidTransition`](OrchestratorError::InvalidTransition),
//!   [`RateLimited`](OrchestratorError::RateLimited);
//! - encoder failures absorbed by the restart policy until it gives up:
//!   [`LaunchError`](OrchestratorError::LaunchError), [`EncoderCrash`](OrchestratorError::EncoderCrash),
//!   [`RestartLimitExceeded`](OrchestratorError::RestartLimitExceeded);
//! - non-retryable input failures: [`SourceUnavailable`](OrchestratorError::SourceUnavailable).
//!
//! Component errors ([`LaunchError`], [`SourceError`], [`StoreError`], [`ConfigError`])
//! convert into it with `From`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::{CallerId, SessionId, SessionState};

/// Scope at which a concurrency cap was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityScope {
    /// The per-owner cap.
    Owner(CallerId),
    /// The process-wide cap.
    Global,
}

impl fmt::Display for CapacityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityScope::Owner(owner) => write!(f, "owner {owner}"),
            CapacityScope::Global => f.write_str("all owners"),
        }
    }
}

/// # Errors produced by the orchestrator.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    /// Creating another session would exceed a configured concurrency cap.
    #[error("session limit reached for {scope}: {limit} active")]
    CapacityExceeded {
        /// Which cap was hit.
        scope: CapacityScope,
        /// The configured limit.
        limit: usize,
    },

    /// No session with this id is known to the registry.
    #[error("session {id} not found")]
    NotFound {
        /// Requested session id.
        id: SessionId,
    },

    /// The lifecycle state machine rejected the request; state is unchanged.
    #[error("session {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Session the request targeted.
        id: SessionId,
        /// State at the time of the request.
        from: SessionState,
        /// State the request would have entered.
        to: SessionState,
    },

    /// The encoder binary could not be started.
    #[error("encoder launch failed: {reason}")]
    LaunchError {
        /// Launch failure details.
        reason: String,
    },

    /// The source acquisition service could not supply a readable input.
    #[error("source {input} unavailable: {reason}")]
    SourceUnavailable {
        /// Source reference as supplied by the caller.
        input: String,
        /// Failure details.
        reason: String,
    },

    /// The encoder died or reported a fatal diagnostic.
    #[error("encoder crashed: {reason}")]
    EncoderCrash {
        /// Last fatal diagnostic or exit status.
        reason: String,
    },

    /// Automatic restarts are exhausted; the session has been stopped.
    #[error("session {id} stopped after {restarts} restarts: {last_error}")]
    RestartLimitExceeded {
        /// Session that gave up.
        id: SessionId,
        /// Restarts performed before giving up.
        restarts: u32,
        /// Final failure reason.
        last_error: String,
    },

    /// The caller exhausted its rate budget.
    #[error("caller {caller} is rate limited; retry in {retry_after:?}")]
    RateLimited {
        /// Rejected caller.
        caller: CallerId,
        /// Time until a token becomes available.
        retry_after: Duration,
    },

    /// The orchestrator was shut down; no new sessions are created or started.
    #[error("orchestrator is shut down")]
    ShuttingDown,
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use castvisor::{CallerId, OrchestratorError};
    /// use std::time::Duration;
    ///
    /// let err = OrchestratorError::RateLimited { caller: CallerId(7), retry_after: Duration::from_secs(3) };
    /// assert_eq!(err.as_label(), "rate_limited");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::CapacityExceeded { .. } => "capacity_exceeded",
            OrchestratorError::NotFound { .. } => "not_found",
            OrchestratorError::InvalidTransition { .. } => "invalid_transition",
            OrchestratorError::LaunchError { .. } => "launch_error",
            OrchestratorError::SourceUnavailable { .. } => "source_unavailable",
            OrchestratorError::EncoderCrash { .. } => "encoder_crash",
            OrchestratorError::RestartLimitExceeded { .. } => "restart_limit_exceeded",
            OrchestratorError::RateLimited { .. } => "rate_limited",
            OrchestratorError::ShuttingDown => "shutting_down",
        }
    }

    /// Indicates whether the restart policy may retry after this error.
    ///
    /// Only encoder failures are retried. Source failures skip the item instead,
    /// and caller-facing rejections are final for that request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::LaunchError { .. } | OrchestratorError::EncoderCrash { .. }
        )
    }
}

/// # Errors raised while spawning or signalling an encoder process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The configured encoder binary does not exist or is not executable.
    #[error("encoder binary {program:?} not found")]
    MissingExecutable {
        /// Program that was looked up.
        program: String,
    },

    /// The argument set could not be built from the session parameters.
    #[error("invalid encoder arguments: {0}")]
    InvalidArguments(String),

    /// Spawning failed for another I/O reason.
    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),

    /// Process control signal could not be delivered.
    #[error("signal {signal} not delivered: {reason}")]
    Signal {
        /// Signal name.
        signal: &'static str,
        /// Failure details.
        reason: String,
    },
}

impl From<LaunchError> for OrchestratorError {
    fn from(err: LaunchError) -> Self {
        OrchestratorError::LaunchError {
            reason: err.to_string(),
        }
    }
}

/// Failure reported by a [`SourceResolver`](crate::SourceResolver).
#[derive(Error, Debug, Clone)]
#[error("source {input} unavailable: {reason}")]
pub struct SourceError {
    /// Source reference as supplied.
    pub input: String,
    /// Failure details.
    pub reason: String,
}

impl SourceError {
    /// Builds a source error for `input`.
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

impl From<SourceError> for OrchestratorError {
    fn from(err: SourceError) -> Self {
        OrchestratorError::SourceUnavailable {
            input: err.input,
            reason: err.reason,
        }
    }
}

/// Failure reported by a [`SessionStore`](crate::SessionStore).
#[derive(Error, Debug, Clone)]
#[error("store {op} failed: {reason}")]
pub struct StoreError {
    /// Operation name (`put_session`, `get_playlist`, ...).
    pub op: &'static str,
    /// Failure details.
    pub reason: String,
}

/// Invalid environment configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable could not be deserialized.
    #[error("environment: {0}")]
    Env(#[from] envy::Error),

    /// A value parsed but is out of range.
    #[error("{key}: {reason}")]
    Invalid {
        /// Offending variable.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
