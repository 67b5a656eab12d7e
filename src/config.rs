use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{net::IpAddr, path::{Path, PathBuf}, str::FromStr, time::Duration};

/// Process configuration for the scheduler.
///
/// Loaded from environment variables (optionally via a `.env` file) with
/// [`Config::load`], or from a TOML/JSON/YAML file with environment overrides
/// via [`Config::from_file`]. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // Stream
    /// Minutes before a played or requested song may be requested again.
    pub song_request_cooldown: u64,
    /// Maximum number of queued songs.
    pub playlist_size: usize,
    /// Public URL of the audio mount, handed out as is.
    pub stream_endpoint: String,
    /// Random draws tried before falling back to the least recently played song.
    pub max_selection_attempts: usize,
    /// Length assumed for songs whose duration is unknown, in seconds.
    pub default_song_duration: u64,
    /// Recently played entries kept for display.
    pub history_size: usize,

    // Requests
    /// Seconds between two admitted requests of one listener, 0 disables.
    pub requester_cooldown: u64,
    /// Addresses exempt from the per-listener limit.
    pub request_ip_whitelist: Vec<IpAddr>,

    // Catalog and cache
    pub catalog_path: Option<PathBuf>,
    pub catalog_timeout_ms: u64,
    pub cache_size: usize,
    /// Seconds, 0 keeps entries until evicted.
    pub cache_ttl: u64,

    // Runtime
    pub console_verbosity: String,
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            song_request_cooldown: env_or("SONG_REQUEST_COOLDOWN", defaults.song_request_cooldown)?,
            playlist_size: env_or("PLAYLIST_SIZE", defaults.playlist_size)?,
            stream_endpoint: std::env::var("STREAM_ENDPOINT").unwrap_or(defaults.stream_endpoint),
            max_selection_attempts: env_or("MAX_SELECTION_ATTEMPTS", defaults.max_selection_attempts)?,
            default_song_duration: env_or("DEFAULT_SONG_DURATION", defaults.default_song_duration)?,
            history_size: env_or("HISTORY_SIZE", defaults.history_size)?,

            requester_cooldown: env_or("REQUESTER_COOLDOWN", defaults.requester_cooldown)?,
            request_ip_whitelist: match std::env::var("REQUEST_IP_WHITELIST") {
                Ok(list) => parse_ip_list(&list)?,
                Err(_) => defaults.request_ip_whitelist,
            },

            catalog_path: std::env::var("CATALOG_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            catalog_timeout_ms: env_or("CATALOG_TIMEOUT_MS", defaults.catalog_timeout_ms)?,
            cache_size: env_or("CACHE_SIZE", defaults.cache_size)?,
            cache_ttl: env_or("CACHE_TTL", defaults.cache_ttl)?,

            console_verbosity: std::env::var("CONSOLE_VERBOSITY").unwrap_or(defaults.console_verbosity),
            worker_threads: match std::env::var("WORKER_THREADS") {
                Ok(val) if !val.trim().is_empty() => val.trim().parse().context("WORKER_THREADS")?,
                _ => defaults.worker_threads,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reads `path` and applies `FUREON_*` environment overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("FUREON")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("request_ip_whitelist"),
            )
            .build()
            .with_context(|| format!("reading configuration from {}", path.display()))?;

        let config: Self = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity checks on values that would leave the scheduler unusable.
    pub fn validate(&self) -> Result<()> {
        if self.playlist_size == 0 {
            anyhow::bail!("Playlist size must be greater than 0");
        }

        if self.max_selection_attempts == 0 {
            anyhow::bail!("Max selection attempts must be greater than 0");
        }

        if self.cache_size == 0 {
            anyhow::bail!("Cache size must be greater than 0");
        }

        if self.catalog_timeout_ms == 0 {
            anyhow::bail!("Catalog timeout must be greater than 0");
        }

        if self.default_song_duration == 0 {
            anyhow::bail!("Default song duration must be greater than 0");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("Worker threads must be greater than 0");
        }

        if !self.stream_endpoint.is_empty() {
            url::Url::parse(&self.stream_endpoint)
                .with_context(|| format!("Stream endpoint is not a valid URL: {}", self.stream_endpoint))?;
        }

        crate::logging::level_for(&self.console_verbosity)?;

        Ok(())
    }

    pub fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.song_request_cooldown.saturating_mul(60))
    }

    pub fn requester_window(&self) -> Duration {
        Duration::from_secs(self.requester_cooldown)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn default_song_duration(&self) -> Duration {
        Duration::from_secs(self.default_song_duration)
    }

    /// Log-safe overview of the active settings.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Stream: {} slots, {} cooldown, endpoint {}\n  \
            Requests: listener limit {}, {} whitelisted addresses\n  \
            Catalog: {}, {} timeout\n  \
            Cache: {} songs, ttl {}\n  \
            Runtime: {} workers, verbosity {}",
            self.playlist_size,
            humantime::format_duration(self.cooldown_window()),
            if self.stream_endpoint.is_empty() { "(unset)" } else { self.stream_endpoint.as_str() },
            if self.requester_cooldown == 0 {
                "off".to_string()
            } else {
                humantime::format_duration(self.requester_window()).to_string()
            },
            self.request_ip_whitelist.len(),
            self.catalog_path
                .as_deref()
                .map_or("(empty in-memory catalog)".to_string(), |p| p.display().to_string()),
            humantime::format_duration(self.catalog_timeout()),
            self.cache_size,
            if self.cache_ttl == 0 {
                "none".to_string()
            } else {
                humantime::format_duration(self.cache_ttl()).to_string()
            },
            self.worker_threads,
            self.console_verbosity,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            song_request_cooldown: 60,
            playlist_size: 20,
            stream_endpoint: String::new(),
            max_selection_attempts: 10,
            default_song_duration: 180,
            history_size: 50,

            requester_cooldown: 0,
            request_ip_whitelist: Vec::new(),

            catalog_path: None,
            catalog_timeout_ms: 2000,
            cache_size: 1000,
            cache_ttl: 3600,

            console_verbosity: "ERROR".to_string(),
            worker_threads: num_cpus::get(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {val}")),
        _ => Ok(default),
    }
}

fn parse_ip_list(list: &str) -> Result<Vec<IpAddr>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().with_context(|| format!("invalid address in REQUEST_IP_WHITELIST: {item}")))
        .collect()
}
