//! In-process store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::{CallerId, SessionId, SessionRecord};
use crate::error::StoreError;
use crate::playlist::PlaylistEntry;
use crate::store::SessionStore;

/// [`SessionStore`] kept in memory. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, SessionRecord>,
    playlists: DashMap<CallerId, Vec<PlaylistEntry>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored session records.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.sessions.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.get(&id).map(|r| r.clone()))
    }

    async fn remove_session(&self, id: SessionId) -> Result<(), StoreError> {
        self.sessions.remove(&id);
        Ok(())
    }

    async fn put_playlist(&self, owner: CallerId, entries: &[PlaylistEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            self.playlists.remove(&owner);
        } else {
            self.playlists.insert(owner, entries.to_vec());
        }
        Ok(())
    }

    async fn get_playlist(&self, owner: CallerId) -> Result<Vec<PlaylistEntry>, StoreError> {
        Ok(self
            .playlists
            .get(&owner)
            .map(|e| e.clone())
            .unwrap_or_default())
    }
}
