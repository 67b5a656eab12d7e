use serde::{ser::SerializeMap, Serialize, Serializer};
use std::time::Duration;

use super::PlaylistEntry;
use crate::catalog::{duration_secs, SongId, SongMetadata};

/// A queued entry joined with fresh catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    #[serde(skip)]
    pub position: usize,
    pub song_id: SongId,
    pub title: String,
    pub artist: String,
    pub user_requested: bool,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl SnapshotEntry {
    /// Takes title, artist and duration from the catalog record.
    pub fn enriched(entry: &PlaylistEntry, song: &SongMetadata) -> Self {
        Self {
            position: entry.position,
            song_id: entry.song_id,
            title: song.title.clone(),
            artist: song.artist.clone(),
            user_requested: entry.user_requested,
            duration: song.duration,
        }
    }
}

impl From<&PlaylistEntry> for SnapshotEntry {
    /// Falls back to the metadata captured at admission.
    fn from(entry: &PlaylistEntry) -> Self {
        Self {
            position: entry.position,
            song_id: entry.song_id,
            title: entry.title.clone(),
            artist: entry.artist.clone(),
            user_requested: entry.user_requested,
            duration: entry.duration,
        }
    }
}

/// Ordered, read-only view of the playlist.
///
/// Serializes as a JSON object keyed by position, `{"1": {...}, "2": {...}}`,
/// which is what the playlist endpoint returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl PlaylistSnapshot {
    pub(crate) fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self { entries }
    }

    /// Entry at a 1-based position.
    pub fn get(&self, position: usize) -> Option<&SnapshotEntry> {
        position.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.entries.iter().map(|e| e.duration).sum()
    }
}

impl Serialize for PlaylistSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.position.to_string(), entry)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: u64, position: usize) -> SnapshotEntry {
        SnapshotEntry {
            position,
            song_id: SongId(id),
            title: format!("title {id}"),
            artist: "artist".into(),
            user_requested: id % 2 == 0,
            duration: Duration::from_secs(60 * id),
        }
    }

    #[test]
    fn serializes_keyed_by_position() {
        let snapshot = PlaylistSnapshot::new((1..=11).map(|i| entry(i, i as usize)).collect());
        let json = serde_json::to_value(&snapshot).unwrap();

        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 11);
        assert_eq!(json["1"]["song_id"], 1);
        assert_eq!(json["10"]["duration"], 600);
        assert_eq!(json["2"]["user_requested"], true);
        assert!(json["1"].get("position").is_none());
        for field in ["song_id", "title", "artist", "user_requested", "duration"] {
            assert!(json["11"].get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn positions_are_one_based() {
        let snapshot = PlaylistSnapshot::new(vec![entry(5, 1), entry(6, 2)]);
        assert_eq!(snapshot.get(0), None);
        assert_eq!(snapshot.get(1).unwrap().song_id, SongId(5));
        assert_eq!(snapshot.get(3), None);
        assert_eq!(snapshot.total_duration(), Duration::from_secs(660));
    }

    #[test]
    fn enrichment_prefers_catalog_metadata() {
        let queued = PlaylistEntry {
            song_id: SongId(1),
            title: "old title".into(),
            artist: "old artist".into(),
            duration: Duration::from_secs(100),
            user_requested: true,
            position: 3,
            enqueued_at: Utc::now(),
        };
        let song = SongMetadata {
            song_id: SongId(1),
            title: "new title".into(),
            artist: "new artist".into(),
            album: "album".into(),
            duration: Duration::from_secs(101),
            datetime_added: Utc::now(),
        };

        let enriched = SnapshotEntry::enriched(&queued, &song);
        assert_eq!(enriched.title, "new title");
        assert_eq!(enriched.position, 3);
        assert!(enriched.user_requested);

        let fallback = SnapshotEntry::from(&queued);
        assert_eq!(fallback.title, "old title");
    }
}
