//! Playback driver.
//!
//! Stands in for the audio pipeline: it asks the controller for the next
//! song, waits for as long as that song lasts and repeats until cancelled.
//! A skip cuts the current wait short.

use std::{sync::Arc, time::Duration};
use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::StreamController;

/// Pause before asking again when the catalog had nothing to play.
const IDLE_RETRY: Duration = Duration::from_secs(5);

pub struct PlaybackDriver {
    controller: Arc<StreamController>,
    default_duration: Duration,
}

impl PlaybackDriver {
    pub fn new(controller: Arc<StreamController>, default_duration: Duration) -> Self {
        Self {
            controller,
            default_duration,
        }
    }

    /// Starts the playback loop on the current runtime.
    pub fn spawn(self, token: CancellationToken) -> DriverHandle {
        let skip = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(token.clone(), Arc::clone(&skip)));
        DriverHandle { token, skip, task }
    }

    async fn run(self, token: CancellationToken, skip: Arc<Notify>) {
        info!("▶️ Playback driver started");

        while !token.is_cancelled() {
            let wait = match self.controller.advance().await {
                Some(entry) if !entry.duration.is_zero() => entry.duration,
                Some(entry) => {
                    debug!("Song {} has no duration, assuming {:?}", entry.song_id, self.default_duration);
                    self.default_duration
                }
                None => {
                    warn!("Nothing to play, retrying in {:?}", IDLE_RETRY);
                    IDLE_RETRY
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
                _ = skip.notified() => debug!("Current song skipped"),
            }
        }

        info!("⏹️ Playback driver stopped");
    }
}

/// Control handle for a running [`PlaybackDriver`].
pub struct DriverHandle {
    token: CancellationToken,
    skip: Arc<Notify>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Ends the current song now.
    pub fn skip(&self) {
        self.skip.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!("Playback driver ended abnormally: {}", e);
        }
    }
}
