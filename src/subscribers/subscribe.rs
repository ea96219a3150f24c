//! # Notification sink trait
//!
//! `Subscribe` is the extension point for delivering lifecycle events to the
//! outside world (a chat reply formatter, an audit log, metrics). Each subscriber
//! is driven by a dedicated worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (network I/O, retries); they do **not** block
//!   the session actors nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped** and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use castvisor::{Event, EventKind, Subscribe};
//!
//! struct ChatNotifier;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for ChatNotifier {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::RestartLimitExceeded {
//!             // format and send a message to ev.owner ...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "chat" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
