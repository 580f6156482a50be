//! What the presence shows for a given track and lyric line.

use lyricord_core::{LyricLine, TrackInfo};

/// Discord rejects text fields outside 2..=128 characters
const MAX_FIELD_CHARS: usize = 128;
const MIN_FIELD_CHARS: usize = 2;
/// Blank braille pattern, rendered as whitespace but not trimmed by Discord
const PADDING: char = '\u{2800}';

pub const NOTHING_PLAYING: &str = "Nothing playing";

/// Owned snapshot of a Rich Presence activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceActivity {
    pub details: String,
    pub state: Option<String>,
    pub large_image: &'static str,
    pub large_text: &'static str,
    pub small_image: &'static str,
    pub small_text: &'static str,
}

impl PresenceActivity {
    /// Activity for `line` sung in `track`.
    ///
    /// Details read "track by first artist" and the state is the line text.
    /// Without a track the presence shows as paused with nothing playing.
    #[must_use]
    pub fn new(track: Option<&TrackInfo>, line: Option<&LyricLine>) -> Self {
        let Some(track) = track else {
            return Self::idle();
        };

        let details = match track.primary_artist() {
            "" => track.name.clone(),
            artist => format!("{} by {}", track.name, artist),
        };

        Self {
            details: fit_field(&details).unwrap_or_else(|| NOTHING_PLAYING.to_string()),
            state: line.and_then(|l| fit_field(&l.text)),
            large_image: "lyrics",
            large_text: "Lyrics",
            small_image: "play",
            small_text: "Playing",
        }
    }

    /// Activity shown while nothing is playing
    #[must_use]
    pub fn idle() -> Self {
        Self {
            details: NOTHING_PLAYING.to_string(),
            state: None,
            large_image: "spotify",
            large_text: "Spotify",
            small_image: "pause",
            small_text: "Paused",
        }
    }
}

/// Trim and clamp text to what Discord accepts. Blank text is dropped.
fn fit_field(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut fitted: String = text.chars().take(MAX_FIELD_CHARS).collect();
    while fitted.chars().count() < MIN_FIELD_CHARS {
        fitted.push(PADDING);
    }
    Some(fitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn track(artists: &[&str]) -> TrackInfo {
        TrackInfo::new(
            "id",
            "Song",
            artists.iter().map(ToString::to_string).collect(),
            "Album",
            Duration::from_secs(180),
        )
    }

    #[test]
    fn test_line_activity() {
        let track = track(&["First", "Second"]);
        let line = LyricLine::new(1.0, "hello there");
        let activity = PresenceActivity::new(Some(&track), Some(&line));

        assert_eq!(activity.details, "Song by First");
        assert_eq!(activity.state.as_deref(), Some("hello there"));
        assert_eq!(activity.small_text, "Playing");
    }

    #[test]
    fn test_no_line_leaves_state_empty() {
        let track = track(&["First"]);
        let activity = PresenceActivity::new(Some(&track), None);
        assert_eq!(activity.details, "Song by First");
        assert!(activity.state.is_none());

        let blank = LyricLine::new(4.0, "   ");
        assert!(PresenceActivity::new(Some(&track), Some(&blank))
            .state
            .is_none());
    }

    #[test]
    fn test_idle_activity() {
        let line = LyricLine::new(1.0, "stale");
        let activity = PresenceActivity::new(None, Some(&line));
        assert_eq!(activity, PresenceActivity::idle());
        assert_eq!(activity.details, NOTHING_PLAYING);
        assert_eq!(activity.small_text, "Paused");
    }

    #[test]
    fn test_track_without_artist() {
        let activity = PresenceActivity::new(Some(&track(&[])), None);
        assert_eq!(activity.details, "Song");
    }

    #[test]
    fn test_field_limits() {
        let long = "la ".repeat(100);
        let fitted = fit_field(&long).unwrap();
        assert_eq!(fitted.chars().count(), MAX_FIELD_CHARS);

        let short = fit_field("o").unwrap();
        assert_eq!(short.chars().count(), MIN_FIELD_CHARS);
        assert!(short.starts_with('o'));

        assert_eq!(fit_field("你好").as_deref(), Some("你好"));
    }
}
