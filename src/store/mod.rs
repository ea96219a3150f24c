//! Durable session and playlist records.
//!
//! The orchestrator writes a [`SessionRecord`](crate::SessionRecord) after each
//! lifecycle transition and the owner's playlist after each queue mutation. It
//! never depends on a write succeeding: failures are logged and the transition
//! stands.

mod memory;

use async_trait::async_trait;

use crate::core::{CallerId, SessionId, SessionRecord};
use crate::error::StoreError;
use crate::playlist::PlaylistEntry;

pub use memory::MemoryStore;

/// Key/record persistence used by the orchestrator.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Inserts or replaces a session record.
    async fn put_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Loads a session record.
    async fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Deletes a session record; deleting a missing record is not an error.
    async fn remove_session(&self, id: SessionId) -> Result<(), StoreError>;

    /// Replaces an owner's playlist.
    async fn put_playlist(&self, owner: CallerId, entries: &[PlaylistEntry]) -> Result<(), StoreError>;

    /// Loads an owner's playlist (empty if none).
    async fn get_playlist(&self, owner: CallerId) -> Result<Vec<PlaylistEntry>, StoreError>;
}
