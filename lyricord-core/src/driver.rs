//! Poll loop feeding a playback source into the synchronizer.

use crate::config::SpotifyConfig;
use crate::error::Result;
use crate::fetcher::LyricsFetcher;
use crate::source::PlaybackSource;
use crate::sync::{SyncEvent, Synchronizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A track is loaded (playing or paused)
    Active,
    /// Nothing is playing
    Idle,
}

/// Drives a [`Synchronizer`] from a [`PlaybackSource`].
///
/// Every poll asks the source what is playing. A new track id triggers a
/// lyrics fetch; the reported progress and play state are always forwarded.
/// When nothing is playing the synchronizer is cleared so sinks can show an
/// idle state.
pub struct PlaybackDriver {
    source: Arc<dyn PlaybackSource>,
    fetcher: Arc<LyricsFetcher>,
    synchronizer: Arc<Synchronizer>,
    poll_interval: Duration,
    idle_poll_interval: Duration,
    cancel_token: CancellationToken,
    current_track_id: Mutex<Option<String>>,
}

impl PlaybackDriver {
    pub fn new(
        source: Arc<dyn PlaybackSource>,
        fetcher: Arc<LyricsFetcher>,
        synchronizer: Arc<Synchronizer>,
        config: &SpotifyConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            fetcher,
            synchronizer,
            poll_interval: config.poll_interval(),
            idle_poll_interval: config.idle_poll_interval(),
            cancel_token,
            current_track_id: Mutex::new(None),
        }
    }

    /// Poll the source once and apply the result to the synchronizer.
    ///
    /// # Errors
    ///
    /// Returns the source's error. The synchronizer is left untouched.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let Some(now_playing) = self.source.now_playing().await? else {
            debug!("Nothing playing on {}", self.source.name());
            self.synchronizer.clear().await;
            if self.synchronizer.track().await.is_some() {
                info!("Playback idle");
                self.synchronizer.set_track(None).await;
            }
            return Ok(PollOutcome::Idle);
        };

        let is_new_track = {
            let mut current = self.current_track_id.lock().await;
            if current.as_deref() == Some(now_playing.track.id.as_str()) {
                false
            } else {
                *current = Some(now_playing.track.id.clone());
                true
            }
        };

        if is_new_track {
            info!("Now playing: {}", now_playing.track);
            self.synchronizer
                .set_track(Some(now_playing.track.clone()))
                .await;
            let lyrics = self.fetcher.fetch(&now_playing.track).await;
            self.synchronizer.set_lyrics(lyrics).await;
        } else if self.synchronizer.track().await.is_none() {
            // Same track resumed after an idle period; lyrics are still loaded
            self.synchronizer
                .set_track(Some(now_playing.track.clone()))
                .await;
        }

        debug!(
            "Polled {}: playing={}, progress={:.2}s",
            self.source.name(),
            now_playing.is_playing,
            now_playing.progress
        );

        self.synchronizer.set_progress(now_playing.progress).await;
        if now_playing.is_playing {
            self.synchronizer.start().await;
        } else {
            self.synchronizer.stop().await;
        }

        Ok(PollOutcome::Active)
    }

    /// Poll until the cancellation token fires, then stop the synchronizer.
    pub async fn run(&self) {
        info!("Starting {} playback driver", self.source.name());

        let mut events = self.synchronizer.subscribe();
        let mut consecutive_errors: u32 = 0;
        let mut next_poll = Instant::now();

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    info!("Playback driver shutting down gracefully");
                    break;
                }
                event = events.recv() => log_event(event),
                () = tokio::time::sleep_until(next_poll) => {
                    let delay = match self.poll_once().await {
                        Ok(PollOutcome::Active) => {
                            consecutive_errors = 0;
                            self.poll_interval
                        }
                        Ok(PollOutcome::Idle) => {
                            consecutive_errors = 0;
                            self.idle_poll_interval
                        }
                        Err(e) => {
                            consecutive_errors = consecutive_errors.saturating_add(1);
                            warn!("Poll error (attempt {}): {}", consecutive_errors, e);

                            let backoff = backoff(consecutive_errors);
                            if consecutive_errors >= 5 {
                                error!("Too many consecutive errors, waiting {} seconds", backoff.as_secs());
                            }
                            backoff
                        }
                    };
                    next_poll = Instant::now() + delay;
                }
            }
        }

        self.synchronizer.stop().await;
    }
}

fn log_event(event: std::result::Result<SyncEvent, broadcast::error::RecvError>) {
    match event {
        Ok(SyncEvent::DispatchFailed { message }) => {
            warn!("Lyric dispatch failed: {}", message);
        }
        Ok(_) => {}
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            debug!("Skipped {} sync events", skipped);
        }
        // The driver owns an Arc to the synchronizer, so the sender outlives us
        Err(broadcast::error::RecvError::Closed) => {}
    }
}

/// Exponential backoff: 100ms * 2^errors, capped at 30s
fn backoff(consecutive_errors: u32) -> Duration {
    let backoff_ms = 100_u64.saturating_mul(2_u64.saturating_pow(consecutive_errors.min(10)));
    Duration::from_millis(backoff_ms).min(MAX_BACKOFF)
}
