//! # Per-owner playlist queue.
//!
//! Each owner has an ordered list of [`PlaylistEntry`] values. Positions are always
//! `0..len` with no gaps, so "next" is simply the first unconsumed entry.
//!
//! ```text
//! enqueue(a), enqueue(b)           [a0 ·] [b1 ·]
//! dequeue_next(loop=false) → a     [a0 ✓] [b1 ·]
//! dequeue_next(loop=false) → b     [a0 ✓] [b1 ✓]
//! dequeue_next(loop=false) → None  [a0 ✓] [b1 ✓]
//! dequeue_next(loop=true)  → a     [a0 ✓] [b1 ·]   (pass reset, first re-consumed)
//! ```
//!
//! Per-owner entries sit behind one dashmap shard lock, so different owners never
//! contend and one owner's mutations are serialized.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::core::CallerId;

/// One queued input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Rank within the owner's queue, contiguous from 0.
    pub position: usize,
    /// Local path or stream URL.
    pub source: String,
    /// Already played in the current pass.
    pub consumed: bool,
}

/// Ordered backlog of inputs, keyed by owner.
#[derive(Debug, Default)]
pub struct PlaylistQueue {
    queues: DashMap<CallerId, Vec<PlaylistEntry>>,
}

impl PlaylistQueue {
    /// Empty queue set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `source` to `owner`'s queue and returns its position.
    pub fn enqueue(&self, owner: CallerId, source: impl Into<String>) -> usize {
        let mut entries = self.queues.entry(owner).or_default();
        let position = entries.len();
        entries.push(PlaylistEntry {
            position,
            source: source.into(),
            consumed: false,
        });
        position
    }

    /// Returns and marks consumed the first unconsumed entry.
    ///
    /// When every entry is consumed and `loop_enabled` is set, the pass is reset
    /// and the first entry is returned again. A single-entry looping queue thus
    /// yields the same source forever.
    pub fn dequeue_next(&self, owner: CallerId, loop_enabled: bool) -> Option<String> {
        let mut entries = self.queues.get_mut(&owner)?;
        next_in(&mut entries, loop_enabled)
    }

    /// [`dequeue_next`](Self::dequeue_next) that remembers the queue as it was,
    /// so the dequeue can be rolled back with [`undo`](Self::undo).
    pub(crate) fn take_next(&self, owner: CallerId, loop_enabled: bool) -> Option<Taken> {
        let mut entries = self.queues.get_mut(&owner)?;
        let before = entries.clone();
        let source = next_in(&mut entries, loop_enabled)?;
        Some(Taken {
            source,
            before,
            after: entries.clone(),
        })
    }

    /// Rolls back `taken` unless the queue changed since; returns whether it did.
    pub(crate) fn undo(&self, owner: CallerId, taken: Taken) -> bool {
        match self.queues.get_mut(&owner) {
            Some(mut entries) if *entries == taken.after => {
                *entries = taken.before;
                true
            }
            _ => false,
        }
    }

    /// Removes the entry at `position` and re-compacts the rest.
    pub fn remove(&self, owner: CallerId, position: usize) -> Option<PlaylistEntry> {
        let mut entries = self.queues.get_mut(&owner)?;
        if position >= entries.len() {
            return None;
        }
        let removed = entries.remove(position);
        compact(&mut entries);
        Some(removed)
    }

    /// Drops every entry for `owner`; returns how many were removed.
    pub fn clear(&self, owner: CallerId) -> usize {
        self.queues
            .remove(&owner)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0)
    }

    /// Ordered snapshot of `owner`'s queue.
    pub fn list(&self, owner: CallerId) -> Vec<PlaylistEntry> {
        self.queues
            .get(&owner)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Number of entries for `owner`.
    pub fn len(&self, owner: CallerId) -> usize {
        self.queues.get(&owner).map(|e| e.len()).unwrap_or(0)
    }

    /// True if `owner` has no entries.
    pub fn is_empty(&self, owner: CallerId) -> bool {
        self.len(owner) == 0
    }

    /// Replaces `owner`'s queue with previously persisted entries.
    ///
    /// Entries are ordered by their stored position, then re-compacted.
    pub fn hydrate(&self, owner: CallerId, mut entries: Vec<PlaylistEntry>) {
        entries.sort_by_key(|e| e.position);
        compact(&mut entries);
        if entries.is_empty() {
            self.queues.remove(&owner);
        } else {
            self.queues.insert(owner, entries);
        }
    }
}

/// Result of [`PlaylistQueue::take_next`].
#[derive(Debug)]
pub(crate) struct Taken {
    pub source: String,
    before: Vec<PlaylistEntry>,
    after: Vec<PlaylistEntry>,
}

fn next_in(entries: &mut [PlaylistEntry], loop_enabled: bool) -> Option<String> {
    if let Some(entry) = entries.iter_mut().find(|e| !e.consumed) {
        entry.consumed = true;
        return Some(entry.source.clone());
    }
    if !loop_enabled {
        return None;
    }

    for e in entries.iter_mut() {
        e.consumed = false;
    }
    let first = entries.first_mut()?;
    first.consumed = true;
    Some(first.source.clone())
}

fn compact(entries: &mut [PlaylistEntry]) {
    for (i, e) in entries.iter_mut().enumerate() {
        e.position = i;
    }
}
