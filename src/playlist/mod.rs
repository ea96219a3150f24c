//! Playlist queue: per-owner ordered inputs with loop/auto-advance.

mod queue;

pub use queue::{PlaylistEntry, PlaylistQueue};
