use dashmap::{mapref::entry::Entry, DashMap};
use std::{
    collections::HashSet,
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::OnceCell;
use tracing::{debug, error};

use super::SongCache;
use crate::{
    catalog::{SongCatalog, SongId, SongMetadata},
    error::CatalogError,
};

/// Outcome of one catalog fetch, shared by every caller waiting on it.
type Fetch = Arc<OnceCell<Result<SongMetadata, CatalogError>>>;

/// Read-through access to the catalog.
///
/// Song lookups consult the cache first and populate it on a miss. Only one
/// catalog fetch per song runs at a time; concurrent callers wait for it and
/// share its outcome, errors included. Every caller is answered within the
/// configured timeout, however many are waiting.
pub struct CachedCatalog {
    catalog: Arc<dyn SongCatalog>,
    cache: Arc<dyn SongCache>,
    inflight: DashMap<SongId, Fetch>,
    timeout: Duration,
}

impl CachedCatalog {
    pub fn new(catalog: Arc<dyn SongCatalog>, cache: Arc<dyn SongCache>, timeout: Duration) -> Self {
        Self {
            catalog,
            cache,
            inflight: DashMap::new(),
            timeout,
        }
    }

    /// Metadata for `song_id`, from the cache when possible.
    pub async fn get(&self, song_id: SongId) -> Result<SongMetadata, CatalogError> {
        if let Some(song) = self.cache.get(song_id).await {
            return Ok(song);
        }

        let waiting = Waiting::join(&self.inflight, song_id);
        let fetch = waiting.fetch().get_or_init(move || async move {
            // A fetch that just finished may have filled the cache.
            if let Some(song) = self.cache.get(song_id).await {
                return Ok(song);
            }
            debug!("Cache miss for song {}, asking the catalog", song_id);
            let fetched = self.bounded(self.catalog.get_by_id(song_id)).await;
            if let Ok(song) = &fetched {
                self.cache.put(song.clone()).await;
            }
            fetched
        });

        // The fetch is bounded too, but a waiter may have to take it over
        // when the caller that started it goes away.
        let result = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result.clone(),
            Err(_) => Err(self.timed_out()),
        };
        result
    }

    /// Drops the cached record and reloads it from the catalog.
    pub async fn refresh(&self, song_id: SongId) -> Result<SongMetadata, CatalogError> {
        self.cache.invalidate(song_id).await;
        self.get(song_id).await
    }

    pub async fn album(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError> {
        self.bounded(self.catalog.get_by_album_name(name)).await
    }

    pub async fn artist(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError> {
        self.bounded(self.catalog.get_by_artist_name(name)).await
    }

    pub async fn random_id_sample(&self, exclude: &HashSet<SongId>) -> Result<Option<SongId>, CatalogError> {
        self.bounded(self.catalog.random_id_sample(exclude)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, CatalogError>>) -> Result<T, CatalogError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> CatalogError {
        let limit = humantime::format_duration(self.timeout);
        error!("Catalog did not answer within {}", limit);
        CatalogError::Unavailable(format!("no answer within {limit}"))
    }
}

/// A caller's membership in the in-flight fetch for one song.
///
/// The last member to leave removes the entry, whether its lookup finished
/// or its future was dropped.
struct Waiting<'a> {
    inflight: &'a DashMap<SongId, Fetch>,
    song_id: SongId,
    fetch: Fetch,
}

impl<'a> Waiting<'a> {
    fn join(inflight: &'a DashMap<SongId, Fetch>, song_id: SongId) -> Self {
        let fetch = inflight.entry(song_id).or_default().clone();
        Self {
            inflight,
            song_id,
            fetch,
        }
    }

    fn fetch(&self) -> &OnceCell<Result<SongMetadata, CatalogError>> {
        &self.fetch
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        let fetch = std::mem::take(&mut self.fetch);
        // Members join and leave under the shard lock, so the count is exact.
        if let Entry::Occupied(entry) = self.inflight.entry(self.song_id) {
            let ours = Arc::ptr_eq(entry.get(), &fetch);
            drop(fetch);
            if ours && Arc::strong_count(entry.get()) == 1 {
                entry.remove();
            }
        }
    }
}
