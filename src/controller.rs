//! # Stream Controller
//!
//! The single authority over the playlist. It admits listener requests,
//! advances playback when the driver reports a finished song, keeps the
//! queue topped up with random picks from the catalog, and assembles the
//! read-only playlist view served by the API.
//!
//! ## Locking
//!
//! The queue and the cooldown tracker each guard their own state; there is
//! no lock spanning both. Admission runs its checks and the push under the
//! queue's write lock, so concurrent requests are ordered by the moment that
//! lock is taken. Catalog lookups always happen before any lock is taken.
//! Advances and random requests are serialized among themselves only, so a
//! listener request waiting on a slow catalog never holds up the playback
//! driver. Every catalog call is bounded by the configured timeout.
//!
//! ## Random selection
//!
//! When a slot needs filling, up to `max_selection_attempts` random ids are
//! drawn, skipping anything already queued or still cooling down. If every
//! draw fails the controller replays the least recently played song that is
//! not queued, so the stream keeps going even with a tiny catalog.

use parking_lot::{Mutex, RwLock};
use std::{
    collections::{HashSet, VecDeque},
    net::IpAddr,
    sync::Arc,
};
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CachedCatalog, SongCache},
    catalog::{SongCatalog, SongId, SongMetadata},
    clock::{Clock, SystemClock},
    config::Config,
    cooldown::CooldownTracker,
    error::{CatalogError, RequestError, RequestResult},
    playlist::{PlaylistEntry, PlaylistQueue, PlaylistSnapshot, SnapshotEntry},
};

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// Choosing a random song for an empty slot.
    Selecting,
    /// Dequeuing the finished song and stamping its cooldown.
    Advancing,
}

/// Who is asking for a song.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterContext {
    pub ip: Option<IpAddr>,
    pub user: Option<String>,
}

impl RequesterContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            ip: Some(ip),
            user: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Throttle key: the user name when known, otherwise the address.
    fn throttle_key(&self) -> Option<String> {
        match (&self.user, self.ip) {
            (Some(user), _) => Some(format!("user:{user}")),
            (None, Some(ip)) => Some(format!("ip:{ip}")),
            (None, None) => None,
        }
    }
}

#[derive(Debug)]
struct StreamOptions {
    stream_endpoint: String,
    max_selection_attempts: usize,
    history_size: usize,
    request_ip_whitelist: HashSet<IpAddr>,
}

pub struct StreamController {
    queue: PlaylistQueue,
    cooldowns: CooldownTracker<SongId>,
    requesters: CooldownTracker<String>,
    catalog: CachedCatalog,
    clock: Arc<dyn Clock>,
    state: Mutex<ControllerState>,
    advancing: tokio::sync::Mutex<()>,
    now_playing: RwLock<Option<PlaylistEntry>>,
    history: RwLock<VecDeque<PlaylistEntry>>,
    options: StreamOptions,
}

impl StreamController {
    pub fn new(config: &Config, catalog: Arc<dyn SongCatalog>, cache: Arc<dyn SongCache>) -> Self {
        Self::with_clock(config, catalog, cache, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        catalog: Arc<dyn SongCatalog>,
        cache: Arc<dyn SongCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue: PlaylistQueue::new(config.playlist_size),
            cooldowns: CooldownTracker::new(config.cooldown_window()),
            requesters: CooldownTracker::new(config.requester_window()),
            catalog: CachedCatalog::new(catalog, cache, config.catalog_timeout()),
            clock,
            state: Mutex::new(ControllerState::Idle),
            advancing: tokio::sync::Mutex::new(()),
            now_playing: RwLock::new(None),
            history: RwLock::new(VecDeque::with_capacity(config.history_size)),
            options: StreamOptions {
                stream_endpoint: config.stream_endpoint.clone(),
                max_selection_attempts: config.max_selection_attempts.max(1),
                history_size: config.history_size,
                request_ip_whitelist: config.request_ip_whitelist.iter().copied().collect(),
            },
        }
    }

    /// Admits a listener request for `song_id`.
    ///
    /// On success the song is appended as user-requested and its cooldown
    /// starts immediately, so it cannot be requested again while it waits
    /// in the queue.
    pub async fn add_song_with_user_request_to_playlist(
        &self,
        song_id: SongId,
        requester: &RequesterContext,
    ) -> RequestResult<()> {
        let song = self
            .catalog
            .get(song_id)
            .await
            .map_err(|e| RequestError::from_catalog(song_id, e))?;

        let now = self.clock.now();
        let requester_key = self.requester_key(requester);

        let position = {
            let mut queue = self.queue.write();

            if let Some(key) = &requester_key {
                if let Some(retry_after) = self.requesters.remaining(key, now) {
                    debug!("Request for {} refused, {} is throttled", song_id, key);
                    return Err(RequestError::RequesterThrottled { retry_after });
                }
            }
            if let Some(retry_after) = self.cooldowns.remaining(&song_id, now) {
                return Err(RequestError::RequestThrottled { song_id, retry_after });
            }
            if queue.contains(song_id) {
                return Err(RequestError::RequestThrottled {
                    song_id,
                    retry_after: self.cooldowns.window(),
                });
            }
            if queue.is_full() {
                return Err(RequestError::PlaylistFull);
            }

            self.cooldowns
                .try_claim(song_id, now)
                .map_err(|retry_after| RequestError::RequestThrottled { song_id, retry_after })?;
            let position = queue.enqueue(PlaylistEntry::from_metadata(&song, true, now))?;

            if let Some(key) = requester_key {
                self.requesters.record_play_or_request(key, now);
            }
            position
        };

        info!("➕ Request admitted: {} - {} ({}) at position {}", song.artist, song.title, song_id, position);
        Ok(())
    }

    /// Queues a random song as if a listener had asked for it.
    ///
    /// Skips every requester check but not the song cooldown: only songs
    /// outside their window are drawn, with no least-recently-played
    /// fallback. Meant for tests and operators filling the playlist by hand.
    pub async fn add_random_song_with_user_request_to_playlist(&self) -> RequestResult<SongId> {
        if self.queue.is_full() {
            return Err(RequestError::PlaylistFull);
        }

        let _advancing = self.advancing.lock().await;
        let now = self.clock.now();
        let song = self
            .select_candidate(now, Fallback::Never)
            .await
            .map_err(|e| match e {
                CatalogError::Unavailable(reason) => RequestError::CatalogUnavailable(reason),
                CatalogError::NotFound => RequestError::CatalogUnavailable("catalog returned no song".into()),
            })?
            .ok_or_else(|| RequestError::CatalogUnavailable("no song is outside its cooldown".into()))?;

        let song_id = song.song_id;
        {
            let mut queue = self.queue.write();
            if queue.contains(song_id) {
                return Err(RequestError::RequestThrottled {
                    song_id,
                    retry_after: self.cooldowns.window(),
                });
            }
            if queue.is_full() {
                return Err(RequestError::PlaylistFull);
            }
            self.cooldowns
                .try_claim(song_id, now)
                .map_err(|retry_after| RequestError::RequestThrottled { song_id, retry_after })?;
            queue.enqueue(PlaylistEntry::from_metadata(&song, true, now))?;
        }

        info!("🎲 Random request queued: {} - {} ({})", song.artist, song.title, song_id);
        Ok(song_id)
    }

    /// Called by the playback driver when the current song has finished.
    ///
    /// Pops the next entry (filling from the catalog first if the queue ran
    /// dry), stamps its cooldown, then refills one slot. Returns the entry
    /// that is now playing; `None` only when the catalog offers nothing.
    pub async fn advance(&self) -> Option<PlaylistEntry> {
        let _advancing = self.advancing.lock().await;
        let now = self.clock.now();

        let mut playing = self.pop_next(now);
        if playing.is_none() {
            warn!("📭 Playlist ran dry, filling from the catalog");
            self.random_fill().await;
            playing = self.pop_next(now);
        }

        match &playing {
            Some(entry) => info!(
                "🎵 Now playing: {} - {} ({}{})",
                entry.artist,
                entry.title,
                entry.song_id,
                if entry.user_requested { ", requested" } else { "" }
            ),
            None => error!("Nothing to play, the catalog offered no song"),
        }
        self.set_now_playing(playing.clone());

        if !self.queue.is_full() {
            self.random_fill().await;
        }

        playing
    }

    /// Adds one random, non-requested song if there is room.
    pub async fn fill_random(&self) -> Option<PlaylistEntry> {
        let _advancing = self.advancing.lock().await;
        self.random_fill().await
    }

    /// The current playlist joined with cached catalog metadata.
    ///
    /// Entries whose song can no longer be resolved keep the metadata
    /// captured when they were queued.
    pub async fn get_playlist_snapshot(&self) -> PlaylistSnapshot {
        let queued = self.queue.snapshot();
        let songs = futures::future::join_all(queued.iter().map(|entry| self.catalog.get(entry.song_id))).await;

        let entries = queued
            .iter()
            .zip(songs)
            .map(|(entry, song)| match song {
                Ok(song) => SnapshotEntry::enriched(entry, &song),
                Err(e) => {
                    warn!("Playlist view uses queued metadata for {}: {}", entry.song_id, e);
                    SnapshotEntry::from(entry)
                }
            })
            .collect();

        PlaylistSnapshot::new(entries)
    }

    /// URL of the live audio mount.
    pub fn stream_endpoint(&self) -> &str {
        &self.options.stream_endpoint
    }

    pub fn now_playing(&self) -> Option<PlaylistEntry> {
        self.now_playing.read().clone()
    }

    /// Songs that started playing, newest first.
    pub fn recently_played(&self) -> Vec<PlaylistEntry> {
        self.history.read().iter().cloned().collect()
    }

    pub async fn find_song(&self, song_id: SongId) -> Result<SongMetadata, CatalogError> {
        self.catalog.get(song_id).await
    }

    pub async fn find_album(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError> {
        self.catalog.album(name).await
    }

    pub async fn find_artist(&self, name: &str) -> Result<Vec<SongMetadata>, CatalogError> {
        self.catalog.artist(name).await
    }

    /// Forces the cached metadata of `song_id` to be reloaded.
    pub async fn refresh_song(&self, song_id: SongId) -> Result<SongMetadata, CatalogError> {
        self.catalog.refresh(song_id).await
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn playlist_size(&self) -> usize {
        self.queue.capacity()
    }

    pub fn cooldowns(&self) -> &CooldownTracker<SongId> {
        &self.cooldowns
    }

    fn pop_next(&self, now: chrono::DateTime<chrono::Utc>) -> Option<PlaylistEntry> {
        let _state = self.enter(ControllerState::Advancing);
        let entry = self.queue.dequeue()?;
        self.cooldowns.record_play_or_request(entry.song_id, now);
        Some(entry)
    }

    async fn random_fill(&self) -> Option<PlaylistEntry> {
        let now = self.clock.now();
        let song = match self.select_candidate(now, Fallback::LeastRecentlyPlayed).await {
            Ok(Some(song)) => song,
            Ok(None) => {
                warn!("No song available for a random fill");
                return None;
            }
            Err(e) => {
                error!("Random fill failed: {}", e);
                return None;
            }
        };

        let mut entry = PlaylistEntry::from_metadata(&song, false, now);
        let mut queue = self.queue.write();
        if queue.contains(song.song_id) {
            debug!("Song {} was queued while selecting, skipping fill", song.song_id);
            return None;
        }
        match queue.enqueue(entry.clone()) {
            Ok(position) => {
                entry.position = position;
                debug!("Random fill: {} - {} ({}) at position {}", song.artist, song.title, song.song_id, position);
                Some(entry)
            }
            Err(e) => {
                debug!("Random fill dropped: {}", e);
                None
            }
        }
    }

    /// Picks an eligible song that is not queued, or the fallback.
    async fn select_candidate(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        fallback: Fallback,
    ) -> Result<Option<SongMetadata>, CatalogError> {
        let _state = self.enter(ControllerState::Selecting);
        let attempts = self.options.max_selection_attempts;
        let mut exclude = self.queue.song_ids();

        for attempt in 1..=attempts {
            let Some(candidate) = self.catalog.random_id_sample(&exclude).await? else {
                break;
            };
            exclude.insert(candidate);

            if !self.cooldowns.is_eligible(&candidate, now) {
                debug!("Draw {}/{}: song {} is cooling down", attempt, attempts, candidate);
                continue;
            }
            match self.catalog.get(candidate).await {
                Ok(song) => return Ok(Some(song)),
                Err(CatalogError::NotFound) => debug!("Draw {}/{}: song {} vanished", attempt, attempts, candidate),
                Err(e) => return Err(e),
            }
        }

        if fallback == Fallback::Never {
            return Ok(None);
        }

        let queued = self.queue.song_ids();
        for (candidate, last_played) in self.cooldowns.least_recent(&queued, attempts) {
            match self.catalog.get(candidate).await {
                Ok(song) => {
                    warn!(
                        "No eligible song after {} draws, replaying {} last played {}",
                        attempts, candidate, last_played
                    );
                    return Ok(Some(song));
                }
                Err(CatalogError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    fn set_now_playing(&self, entry: Option<PlaylistEntry>) {
        if let Some(entry) = &entry {
            let mut history = self.history.write();
            history.push_front(entry.clone());
            history.truncate(self.options.history_size);
        }
        *self.now_playing.write() = entry;
    }

    fn requester_key(&self, requester: &RequesterContext) -> Option<String> {
        if self.requesters.window().is_zero() {
            return None;
        }
        if requester
            .ip
            .is_some_and(|ip| self.options.request_ip_whitelist.contains(&ip))
        {
            return None;
        }
        requester.throttle_key()
    }

    fn enter(&self, state: ControllerState) -> StateGuard<'_> {
        *self.state.lock() = state;
        StateGuard(&self.state)
    }
}

/// What random selection may do once every draw has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    /// Replay the least recently played song, even if still cooling down.
    LeastRecentlyPlayed,
    Never,
}

/// Puts the controller back to idle when a phase ends.
struct StateGuard<'a>(&'a Mutex<ControllerState>);

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = ControllerState::Idle;
    }
}
