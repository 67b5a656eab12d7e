//! # Song Catalog
//!
//! The catalog is the persistent store of song, album and artist metadata.
//! The scheduling core only talks to it through the [`SongCatalog`] trait;
//! production deployments back it with a database, while [`MemoryCatalog`]
//! keeps everything in process and can be loaded from a JSON file.
//!
//! Lookups are expected to be short-lived. The controller wraps every call in
//! a timeout (see [`CachedCatalog`](crate::cache::CachedCatalog)) so a stalled
//! catalog surfaces as [`CatalogError::Unavailable`] instead of blocking the
//! stream.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, num::ParseIntError, str::FromStr, time::Duration};

use crate::error::CatalogError;

pub use memory::MemoryCatalog;

/// Catalog identifier of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub u64);

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SongId {
    fn from(id: u64) -> Self {
        SongId(id)
    }
}

impl FromStr for SongId {
    type Err = ParseIntError;

    /// Parses the `song-id` form field sent by the web layer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SongId)
    }
}

/// Immutable metadata record as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub song_id: SongId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Track length, serialized as whole seconds.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub datetime_added: DateTime<Utc>,
}

/// Read access to the song catalog.
#[async_trait]
pub trait SongCatalog: Send + Sync {
    /// Looks a song up by id.
    async fn get_by_id(&self, song_id: SongId) -> Result<SongMetadata, CatalogError>;

    /// All songs of the named album, in catalog order.
    async fn get_by_album_name(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError>;

    /// All songs of the named artist, in catalog order.
    async fn get_by_artist_name(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError>;

    /// Draws one id uniformly at random among the songs not in `exclude`.
    ///
    /// Returns `Ok(None)` when every song is excluded or the catalog is empty.
    async fn random_id_sample(
        &self,
        exclude: &HashSet<SongId>,
    ) -> Result<Option<SongId>, CatalogError>;
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn song_id_parses_form_values() {
        assert_eq!("1".parse::<SongId>(), Ok(SongId(1)));
        assert_eq!(" 42 ".parse::<SongId>(), Ok(SongId(42)));
        assert!("abc".parse::<SongId>().is_err());
        assert!("-1".parse::<SongId>().is_err());
    }

    #[test]
    fn metadata_serializes_duration_as_seconds() {
        let song = SongMetadata {
            song_id: SongId(1),
            title: "test_title".into(),
            artist: "test_artist".into(),
            album: "test_album".into(),
            duration: Duration::from_secs(215),
            datetime_added: Utc.with_ymd_and_hms(2014, 3, 1, 12, 0, 0).unwrap(),
        };

        let json = serde_json::to_value(&song).unwrap();
        assert_eq!(json["song_id"], 1);
        assert_eq!(json["duration"], 215);

        let back: SongMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, song);
    }
}
