//! Error types shared by the scheduling core.
//!
//! Admission failures are returned as [`RequestError`]; each variant maps to
//! a stable code the web layer turns into an HTTP status. [`CapacityExceeded`]
//! is internal to the queue and is always translated to
//! [`RequestError::PlaylistFull`] before it reaches a caller.

use std::time::Duration;
use thiserror::Error;

use crate::catalog::SongId;

/// Result alias for admission operations.
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// The playlist queue already holds `capacity` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("playlist is at capacity ({capacity} entries)")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// Failures reported by a [`SongCatalog`](crate::catalog::SongCatalog).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("no matching record in the catalog")]
    NotFound,

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Why a song request was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The id does not resolve in the catalog.
    #[error("song {0} does not exist")]
    SongNotFound(SongId),

    /// The song was played, requested or queued too recently.
    #[error("song {song_id} was played or requested recently, try again in {}", wait(.retry_after))]
    RequestThrottled {
        song_id: SongId,
        retry_after: Duration,
    },

    /// The requester already had a song admitted inside their window.
    #[error("you requested a song recently, try again in {}", wait(.retry_after))]
    RequesterThrottled { retry_after: Duration },

    #[error("the playlist is full, try again later")]
    PlaylistFull,

    /// The catalog timed out or failed; the request may be retried.
    #[error("song catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl RequestError {
    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::SongNotFound(_) => "song_not_found",
            RequestError::RequestThrottled { .. } => "request_throttled",
            RequestError::RequesterThrottled { .. } => "requester_throttled",
            RequestError::PlaylistFull => "playlist_full",
            RequestError::CatalogUnavailable(_) => "catalog_unavailable",
        }
    }

    /// HTTP status the web layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::SongNotFound(_) => 404,
            RequestError::RequestThrottled { .. } | RequestError::RequesterThrottled { .. } => 429,
            RequestError::PlaylistFull => 409,
            RequestError::CatalogUnavailable(_) => 503,
        }
    }

    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RequestError::SongNotFound(_))
    }

    /// Suggested delay before retrying, when one is known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RequestError::RequestThrottled { retry_after, .. }
            | RequestError::RequesterThrottled { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    pub(crate) fn from_catalog(song_id: SongId, err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => RequestError::SongNotFound(song_id),
            CatalogError::Unavailable(reason) => RequestError::CatalogUnavailable(reason),
        }
    }
}

impl From<CapacityExceeded> for RequestError {
    fn from(_: CapacityExceeded) -> Self {
        RequestError::PlaylistFull
    }
}

fn wait(retry_after: &Duration) -> humantime::FormattedDuration {
    // Whole seconds keep the message readable.
    humantime::format_duration(Duration::from_secs(retry_after.as_secs().max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_exceeded_becomes_playlist_full() {
        let err: RequestError = CapacityExceeded { capacity: 20 }.into();
        assert_eq!(err, RequestError::PlaylistFull);
        assert_eq!(err.code(), "playlist_full");
    }

    #[test]
    fn codes_and_statuses_are_distinct() {
        let errors = [
            RequestError::SongNotFound(SongId(7)),
            RequestError::RequestThrottled {
                song_id: SongId(7),
                retry_after: Duration::from_secs(60),
            },
            RequestError::RequesterThrottled {
                retry_after: Duration::from_secs(5),
            },
            RequestError::PlaylistFull,
            RequestError::CatalogUnavailable("timeout".into()),
        ];

        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(errors[0].status_code(), 404);
        assert_eq!(errors[1].status_code(), 429);
        assert_eq!(errors[4].status_code(), 503);
    }

    #[test]
    fn throttled_message_mentions_wait() {
        let err = RequestError::RequestThrottled {
            song_id: SongId(3),
            retry_after: Duration::from_secs(90),
        };
        assert_eq!(
            err.to_string(),
            "song 3 was played or requested recently, try again in 1m 30s"
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(90)));
        assert!(err.is_transient());
        assert!(!RequestError::SongNotFound(SongId(3)).is_transient());
    }

    #[test]
    fn catalog_errors_map_to_request_errors() {
        assert_eq!(
            RequestError::from_catalog(SongId(1), CatalogError::NotFound),
            RequestError::SongNotFound(SongId(1))
        );
        assert_eq!(
            RequestError::from_catalog(SongId(1), CatalogError::Unavailable("down".into())),
            RequestError::CatalogUnavailable("down".into())
        );
    }
}
