use std::time::Duration;

/// What the music service reports as currently playing
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: TrackInfo,
    /// Playback position in seconds
    pub progress: f64,
    pub is_playing: bool,
}

impl NowPlaying {
    #[must_use]
    pub const fn new(track: TrackInfo, progress: f64, is_playing: bool) -> Self {
        Self {
            track,
            progress,
            is_playing,
        }
    }
}

/// Information about the currently playing track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Source-specific track ID, used to detect track changes
    pub id: String,
    pub name: String,
    /// Artist names in credit order
    pub artists: Vec<String>,
    pub album: String,
    pub duration: Duration,
}

impl TrackInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artists: Vec<String>,
        album: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists,
            album: album.into(),
            duration,
        }
    }

    /// First credited artist, or an empty string
    #[must_use]
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or("", String::as_str)
    }

    /// All artists joined with `", "`
    #[must_use]
    pub fn artist_names(&self) -> String {
        self.artists.join(", ")
    }

    /// Duration in whole seconds, saturating at `u32::MAX`
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        u32::try_from(self.duration.as_secs()).unwrap_or(u32::MAX)
    }

    /// Whether `other` is a different track than this one
    #[must_use]
    pub fn is_different_track(&self, other: &Self) -> bool {
        self.id != other.id
    }
}

impl std::fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.name, self.artist_names())
    }
}
