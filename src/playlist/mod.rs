//! Playlist entries, the bounded queue that holds them, and the enriched
//! snapshot handed to the web layer.

pub mod queue;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::catalog::{duration_secs, SongId, SongMetadata};

pub use queue::{PlaylistQueue, QueueWriter};
pub use snapshot::{PlaylistSnapshot, SnapshotEntry};

/// One scheduled slot of the stream.
///
/// `position` is 1-based and tracks playback order; the queue renumbers
/// entries as the head is dequeued. Everything else is fixed at admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub song_id: SongId,
    pub title: String,
    pub artist: String,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub user_requested: bool,
    pub position: usize,
    pub enqueued_at: DateTime<Utc>,
}

impl PlaylistEntry {
    pub fn from_metadata(song: &SongMetadata, user_requested: bool, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            song_id: song.song_id,
            title: song.title.clone(),
            artist: song.artist.clone(),
            duration: song.duration,
            user_requested,
            position: 0,
            enqueued_at,
        }
    }
}
