//! # Tracing subscriber for lifecycle events.
//!
//! [`LogWriter`] turns every event into a `tracing` record under the
//! `castvisor::events` target. Crashes and give-ups log at `warn`, the rest at `info`.
//! The host decides where records go by installing a `tracing-subscriber` layer.
//!
//! ## Output (fmt layer)
//! ```text
//! INFO castvisor::events: started session=3f2a9c1e owner=42 state=RUNNING detail=720p 2500k@30fps audio 128k
//! WARN castvisor::events: restart-scheduled session=3f2a9c1e owner=42 attempt=1 delay_ms=5000 detail=Connection refused
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Logs events through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let session = e.session.map(|s| s.short()).unwrap_or_default();
        let owner = e.owner.map(|o| o.0);
        let state = e.state.map(|s| s.as_str());
        let detail = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SessionCrashed
            | EventKind::RestartScheduled
            | EventKind::RestartLimitExceeded
            | EventKind::SourceUnavailable
            | EventKind::QualityDowngraded => tracing::warn!(
                target: "castvisor::events",
                session = %session, owner, state, attempt = e.attempt, delay_ms = e.delay_ms, detail,
                "{}", e.kind.as_str()
            ),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => tracing::warn!(
                target: "castvisor::events",
                subscriber = e.subscriber.unwrap_or(""), detail,
                "{}", e.kind.as_str()
            ),
            _ => tracing::info!(
                target: "castvisor::events",
                session = %session, owner, state, attempt = e.attempt, detail,
                "{}", e.kind.as_str()
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
