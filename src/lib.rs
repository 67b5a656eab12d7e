//! Playlist scheduling core for an automated internet radio stream.
//!
//! [`StreamController`] owns the rolling playlist: it admits listener
//! requests subject to song cooldowns, fills empty slots with random picks
//! from a [`SongCatalog`], advances when the [`PlaybackDriver`] reports a
//! finished song and serves consistent snapshots to readers.

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod controller;
pub mod cooldown;
pub mod driver;
pub mod error;
pub mod logging;
pub mod playlist;

pub use cache::{CachedCatalog, MetadataCache, SongCache};
pub use catalog::{MemoryCatalog, SongCatalog, SongId, SongMetadata};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use controller::{ControllerState, RequesterContext, StreamController};
pub use cooldown::CooldownTracker;
pub use driver::{DriverHandle, PlaybackDriver};
pub use error::{CapacityExceeded, CatalogError, RequestError, RequestResult};
pub use playlist::{PlaylistEntry, PlaylistQueue, PlaylistSnapshot, SnapshotEntry};
