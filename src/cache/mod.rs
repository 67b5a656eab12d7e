//! # Song Metadata Cache
//!
//! Fast, ephemeral song metadata lookups in front of the catalog.
//!
//! The controller never talks to a concrete cache: it receives an
//! `Arc<dyn SongCache>` at construction, so deployments can plug in a
//! shared cache server and tests can supply a deterministic double.
//! [`MetadataCache`] is the in-process implementation, an [`LruCache`]
//! bounded by entry count and expired by TTL.
//!
//! [`CachedCatalog`] glues the cache to the catalog: reads populate the
//! cache on a miss, concurrent misses for one song collapse into a single
//! catalog lookup, and every catalog call is bounded by a timeout.
//!
//! Staleness is accepted. Cached records are only replaced when they expire,
//! get evicted, or are refreshed explicitly.
//!
//! ## Configuration
//!
//! ```env
//! CACHE_SIZE=1000           # Maximum number of cached songs
//! CACHE_TTL=3600            # Time-to-live in seconds, 0 disables expiry
//! CATALOG_TIMEOUT_MS=2000   # Upper bound for one catalog lookup
//! ```

pub mod lookup;
pub mod lru_cache;

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::catalog::{SongId, SongMetadata};

pub use lookup::CachedCatalog;
pub use lru_cache::{CacheStats, LruCache};

/// Key/value store for song metadata.
#[async_trait]
pub trait SongCache: Send + Sync {
    async fn get(&self, song_id: SongId) -> Option<SongMetadata>;

    async fn put(&self, song: SongMetadata);

    /// Forgets `song_id` so the next read goes to the catalog.
    async fn invalidate(&self, song_id: SongId);
}

/// In-process song metadata cache.
pub type MetadataCache = LruCache<SongId, SongMetadata>;

impl MetadataCache {
    /// Cache of at most `capacity` songs; a zero `ttl` disables expiry.
    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self::new(capacity, (!ttl.is_zero()).then_some(ttl))
    }

    /// Drops expired entries; meant to run periodically.
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
    }
}

#[async_trait]
impl SongCache for MetadataCache {
    async fn get(&self, song_id: SongId) -> Option<SongMetadata> {
        LruCache::get(self, &song_id)
    }

    async fn put(&self, song: SongMetadata) {
        self.insert(song.song_id, song);
    }

    async fn invalidate(&self, song_id: SongId) {
        self.remove(&song_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn metadata_cache_round_trips_through_the_trait() {
        let cache = MetadataCache::with_ttl(8, Duration::ZERO);
        assert_eq!(cache.ttl(), None);

        let song = SongMetadata {
            song_id: SongId(5),
            title: "t".into(),
            artist: "a".into(),
            album: "b".into(),
            duration: Duration::from_secs(1),
            datetime_added: Utc::now(),
        };
        let dyn_cache: &dyn SongCache = &cache;

        assert_eq!(dyn_cache.get(SongId(5)).await, None);
        dyn_cache.put(song.clone()).await;
        assert_eq!(dyn_cache.get(SongId(5)).await, Some(song));
        dyn_cache.invalidate(SongId(5)).await;
        assert_eq!(dyn_cache.get(SongId(5)).await, None);
    }
}
