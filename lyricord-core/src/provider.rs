use crate::error::CoreError;
use crate::lrc::LrcFile;
use crate::playback::TrackInfo;
use async_trait::async_trait;

/// Query parameters for fetching lyrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsQuery {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    /// Track duration in seconds (for matching)
    pub duration_secs: Option<u32>,
}

impl LyricsQuery {
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
            album_name: None,
            duration_secs: None,
        }
    }

    /// Build a query for `track` using its first credited artist
    #[must_use]
    pub fn for_track(track: &TrackInfo) -> Self {
        let query = Self::new(&track.name, track.primary_artist()).with_duration(track.duration_secs());
        if track.album.is_empty() {
            query
        } else {
            query.with_album(&track.album)
        }
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

/// Result from a lyrics provider
#[derive(Debug, Clone, PartialEq)]
pub enum LyricsResult {
    /// Synchronized lyrics with timing
    Synced(LrcFile),
    /// Plain text lyrics without timing
    Unsynced(String),
    NotFound,
}

impl LyricsResult {
    #[must_use]
    pub const fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }

    #[must_use]
    pub const fn as_synced(&self) -> Option<&LrcFile> {
        match self {
            Self::Synced(lrc) => Some(lrc),
            _ => None,
        }
    }
}

/// Lyrics with provider metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedLyrics {
    pub result: LyricsResult,
    /// Provider-specific ID (e.g. LRCLIB's numeric ID as string)
    pub provider_id: String,
}

/// Trait for lyrics providers
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch lyrics for a query.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures or when the provider reports
    /// that nothing matches.
    async fn fetch(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_query_for_track() {
        let track = TrackInfo::new(
            "id",
            "Song",
            vec!["Lead".to_string(), "Feature".to_string()],
            "Album",
            Duration::from_secs(200),
        );
        let query = LyricsQuery::for_track(&track);

        assert_eq!(query.track_name, "Song");
        assert_eq!(query.artist_name, "Lead");
        assert_eq!(query.album_name.as_deref(), Some("Album"));
        assert_eq!(query.duration_secs, Some(200));
    }

    #[test]
    fn test_query_without_album() {
        let track = TrackInfo::new("id", "Song", vec![], "", Duration::ZERO);
        assert!(LyricsQuery::for_track(&track).album_name.is_none());
    }

    #[test]
    fn test_result_kinds() {
        let synced = LyricsResult::Synced(LrcFile::default());
        assert!(synced.is_found() && synced.is_synced());
        assert!(synced.as_synced().is_some());

        let plain = LyricsResult::Unsynced("words".into());
        assert!(plain.is_found() && !plain.is_synced());

        assert!(!LyricsResult::NotFound.is_found());
    }
}
