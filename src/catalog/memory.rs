use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};
use tokio::fs;
use tracing::{info, warn};

use super::{SongCatalog, SongId, SongMetadata};
use crate::error::CatalogError;

/// Catalog held entirely in memory, ordered by song id.
///
/// Backs the binary and the test-suite. The on-disk format is a JSON array of
/// [`SongMetadata`] records.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    songs: RwLock<BTreeMap<SongId, SongMetadata>>,
}

impl MemoryCatalog {
    pub fn new(songs: impl IntoIterator<Item = SongMetadata>) -> Self {
        Self {
            songs: RwLock::new(songs.into_iter().map(|s| (s.song_id, s)).collect()),
        }
    }

    /// Reads a catalog file written by [`MemoryCatalog::save_json`].
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading catalog file {}", path.display()))?;
        let songs: Vec<SongMetadata> = serde_json::from_str(&content)
            .with_context(|| format!("parsing catalog file {}", path.display()))?;

        let total = songs.len();
        let catalog = Self::new(songs);
        let loaded = catalog.len();
        if loaded < total {
            warn!("📂 Catalog {} has {} duplicate ids, kept the last of each", path.display(), total - loaded);
        }
        info!("📂 Loaded {} songs from {}", loaded, path.display());

        Ok(catalog)
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = {
            let songs = self.songs.read();
            serde_json::to_string_pretty(&songs.values().collect::<Vec<_>>())?
        };
        fs::write(path, content)
            .await
            .with_context(|| format!("writing catalog file {}", path.display()))?;
        Ok(())
    }

    /// Adds or replaces a song, returning the previous record.
    pub fn insert(&self, song: SongMetadata) -> Option<SongMetadata> {
        self.songs.write().insert(song.song_id, song)
    }

    pub fn remove(&self, song_id: SongId) -> Option<SongMetadata> {
        self.songs.write().remove(&song_id)
    }

    pub fn len(&self) -> usize {
        self.songs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.read().is_empty()
    }

    fn matching(&self, predicate: impl Fn(&SongMetadata) -> bool) -> Result<Vec<SongMetadata>, CatalogError> {
        let found: Vec<_> = self.songs.read().values().filter(|s| predicate(s)).cloned().collect();
        if found.is_empty() {
            Err(CatalogError::NotFound)
        } else {
            Ok(found)
        }
    }
}

#[async_trait]
impl SongCatalog for MemoryCatalog {
    async fn get_by_id(&self, song_id: SongId) -> Result<SongMetadata, CatalogError> {
        self.songs.read().get(&song_id).cloned().ok_or(CatalogError::NotFound)
    }

    async fn get_by_album_name(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError> {
        self.matching(|s| s.album.eq_ignore_ascii_case(name))
    }

    async fn get_by_artist_name(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError> {
        self.matching(|s| s.artist.eq_ignore_ascii_case(name))
    }

    async fn random_id_sample(&self, exclude: &HashSet<SongId>) -> Result<Option<SongId>, CatalogError> {
        let songs = self.songs.read();
        let mut rng = rand::thread_rng();
        Ok(songs.keys().filter(|id| !exclude.contains(id)).copied().choose(&mut rng))
    }
}
