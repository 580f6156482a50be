//! Playback source trait.

use crate::error::Result;
use crate::playback::NowPlaying;
use async_trait::async_trait;

/// A music player or service that can report what is currently playing.
///
/// Sources are polled by the [`PlaybackDriver`](crate::PlaybackDriver), which
/// turns their reports into synchronizer calls. Implementations should only
/// report music tracks; podcasts, ads and other items are `None`.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Returns a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// Query the current playback state.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached. The driver backs off
    /// and retries.
    async fn now_playing(&self) -> Result<Option<NowPlaying>>;
}
