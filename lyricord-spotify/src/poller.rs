//! Spotify playback state polling.

use crate::error::SpotifyError;
use crate::oauth::SpotifyOAuth;
use async_trait::async_trait;
use lyricord_core::{CoreError, NowPlaying, PlaybackSource, TrackInfo};
use rspotify::model::{CurrentPlaybackContext, FullTrack, PlayableItem};
use rspotify::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Spotify [`PlaybackSource`] backed by the current-playback endpoint.
pub struct SpotifyPoller {
    oauth: Arc<SpotifyOAuth>,
}

impl SpotifyPoller {
    #[must_use]
    pub const fn new(oauth: Arc<SpotifyOAuth>) -> Self {
        Self { oauth }
    }

    async fn poll(&self) -> Result<Option<NowPlaying>, SpotifyError> {
        self.oauth.ensure_token_fresh().await?;

        let request_start = Instant::now();
        let playback = self
            .oauth
            .client()
            .current_playback(None, None::<Vec<_>>)
            .await?;
        let latency = request_start.elapsed();

        let now_playing = playback.and_then(|context| now_playing(&context, latency));

        debug!(
            "Polled Spotify: track={:?}, playing={:?}, progress={:?}",
            now_playing.as_ref().map(|n| &n.track.name),
            now_playing.as_ref().map(|n| n.is_playing),
            now_playing.as_ref().map(|n| n.progress)
        );
        Ok(now_playing)
    }
}

/// Convert a playback context, ignoring anything that isn't a music track
fn now_playing(context: &CurrentPlaybackContext, latency: Duration) -> Option<NowPlaying> {
    let Some(PlayableItem::Track(track)) = &context.item else {
        return None;
    };

    let progress = context.progress.and_then(|p| p.to_std().ok());
    Some(NowPlaying::new(
        track_info(track),
        compensated_progress(progress, latency),
        context.is_playing,
    ))
}

fn track_info(track: &FullTrack) -> TrackInfo {
    // Use just the ID part, not the full URI (spotify:track:xxx -> xxx)
    let id = track
        .id
        .as_ref()
        .map(|id| id.id().to_string())
        .unwrap_or_else(|| format!("local:{}", track.name));

    TrackInfo::new(
        id,
        &track.name,
        track.artists.iter().map(|a| a.name.clone()).collect(),
        &track.album.name,
        track.duration.to_std().unwrap_or(Duration::ZERO),
    )
}

/// Reported progress in seconds, assuming it was sampled halfway through the request
fn compensated_progress(progress: Option<Duration>, latency: Duration) -> f64 {
    progress.map_or(0.0, |p| (p + latency / 2).as_secs_f64())
}

#[async_trait]
impl PlaybackSource for SpotifyPoller {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn now_playing(&self) -> Result<Option<NowPlaying>, CoreError> {
        match self.poll().await {
            Ok(now_playing) => Ok(now_playing),
            Err(e) => {
                // Auth errors often clear after a refresh
                if matches!(e, SpotifyError::Api(_)) {
                    if let Err(refresh_err) = self.oauth.refresh_token().await {
                        error!("Token refresh failed: {}", refresh_err);
                    }
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_adds_half_latency() {
        let progress = compensated_progress(
            Some(Duration::from_millis(42_000)),
            Duration::from_millis(300),
        );
        assert!((progress - 42.15).abs() < 1e-9);
    }

    #[test]
    fn test_missing_progress_is_zero() {
        assert!(compensated_progress(None, Duration::from_millis(300)).abs() < f64::EPSILON);
    }
}
