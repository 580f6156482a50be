//! LRCLIB response types and match selection.

use lyricord_core::{FetchedLyrics, LrcFile, LyricsResult};
use serde::Deserialize;
use tracing::{debug, warn};

/// Score given to a candidate whose duration is unknown
const UNKNOWN_DURATION_SCORE: i32 = 50;

/// Penalty for a candidate that only has plain lyrics
const UNSYNCED_PENALTY: i32 = 100;

/// One record from the LRCLIB API.
///
/// Fields we don't use (`trackName`, `albumName`) are ignored by serde.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LrclibRecord {
    pub id: i64,
    pub artist_name: String,
    pub duration: Option<f64>,
    #[serde(default)]
    pub instrumental: bool,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

impl LrclibRecord {
    fn has_lyrics(&self) -> bool {
        self.synced_lyrics.is_some() || self.plain_lyrics.is_some()
    }

    /// Whether the record's duration is within `tolerance` seconds of `expected`
    pub fn duration_within(&self, expected: u32, tolerance: f64) -> bool {
        self.duration
            .is_some_and(|d| (d - f64::from(expected)).abs() <= tolerance)
    }

    /// Convert into provider output.
    ///
    /// Instrumental tracks count as not found. Synced lyrics win when they
    /// contain at least one timed line; otherwise plain lyrics are used.
    pub fn into_fetched(self) -> FetchedLyrics {
        let provider_id = self.id.to_string();

        if self.instrumental {
            debug!("Track is instrumental (lrclib id: {})", self.id);
            return FetchedLyrics {
                result: LyricsResult::NotFound,
                provider_id,
            };
        }

        if let Some(synced) = self.synced_lyrics.as_deref().filter(|s| !s.trim().is_empty()) {
            let lrc = LrcFile::parse(synced);
            if !lrc.lyrics.is_empty() {
                debug!(
                    "Got synced lyrics with {} lines (lrclib id: {})",
                    lrc.lyrics.len(),
                    self.id
                );
                return FetchedLyrics {
                    result: LyricsResult::Synced(lrc),
                    provider_id,
                };
            }
            warn!("Synced lyrics had no timed lines (lrclib id: {})", self.id);
        }

        match self.plain_lyrics {
            Some(plain) if !plain.trim().is_empty() => {
                debug!("Got plain lyrics (lrclib id: {})", self.id);
                FetchedLyrics {
                    result: LyricsResult::Unsynced(plain),
                    provider_id,
                }
            }
            _ => FetchedLyrics {
                result: LyricsResult::NotFound,
                provider_id,
            },
        }
    }
}

/// Score how far `actual` is from `expected` (lower is better), scaled by
/// `scale` and saturating at `i32::MAX`.
pub fn duration_score(actual: Option<f64>, expected: Option<u32>, scale: f64) -> i32 {
    match (actual, expected) {
        (Some(d), Some(q)) => {
            let diff = (d - f64::from(q)).abs() * scale;
            if diff >= f64::from(i32::MAX) {
                i32::MAX
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let score = diff as i32;
                score
            }
        }
        _ => UNKNOWN_DURATION_SCORE,
    }
}

/// Pick the record with lyrics that best matches `duration`, preferring synced lyrics
pub fn best_match(
    records: Vec<LrclibRecord>,
    duration: Option<u32>,
    scale: f64,
) -> Option<LrclibRecord> {
    records
        .into_iter()
        .filter(LrclibRecord::has_lyrics)
        .min_by_key(|r| {
            let sync_score = if r.synced_lyrics.is_some() {
                0
            } else {
                UNSYNCED_PENALTY
            };
            sync_score.saturating_add(duration_score(r.duration, duration, scale))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, duration: Option<f64>, synced: bool) -> LrclibRecord {
        LrclibRecord {
            id,
            artist_name: "Artist".into(),
            duration,
            instrumental: false,
            plain_lyrics: Some("plain".into()),
            synced_lyrics: synced.then(|| "[00:01.00]timed".to_string()),
        }
    }

    #[test]
    fn test_deserialize_api_record() {
        let json = r#"{
            "id": 3396226,
            "trackName": "I Want to Live",
            "artistName": "Borislav Slavov",
            "albumName": "Baldur's Gate 3",
            "duration": 233,
            "instrumental": false,
            "plainLyrics": "I feel your breath",
            "syncedLyrics": "[00:17.12] I feel your breath"
        }"#;
        let record: LrclibRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 3_396_226);
        assert_eq!(record.artist_name, "Borislav Slavov");
        assert_eq!(record.duration, Some(233.0));

        let fetched = record.into_fetched();
        assert_eq!(fetched.provider_id, "3396226");
        let lrc = fetched.result.as_synced().unwrap();
        assert_eq!(lrc.lyrics.lines()[0].text, "I feel your breath");
    }

    #[test]
    fn test_instrumental_is_not_found() {
        let mut r = record(1, Some(100.0), true);
        r.instrumental = true;
        assert_eq!(r.into_fetched().result, LyricsResult::NotFound);
    }

    #[test]
    fn test_untimed_synced_falls_back_to_plain() {
        let mut r = record(1, None, false);
        r.synced_lyrics = Some("no timestamps here".into());
        assert_eq!(
            r.into_fetched().result,
            LyricsResult::Unsynced("plain".into())
        );
    }

    #[test]
    fn test_blank_lyrics_not_found() {
        let mut r = record(1, None, false);
        r.plain_lyrics = Some("   ".into());
        assert_eq!(r.into_fetched().result, LyricsResult::NotFound);
    }

    #[test]
    fn test_duration_score() {
        assert_eq!(duration_score(Some(200.0), Some(200), 10.0), 0);
        assert_eq!(duration_score(Some(201.5), Some(200), 10.0), 15);
        assert_eq!(duration_score(None, Some(200), 10.0), UNKNOWN_DURATION_SCORE);
        assert_eq!(duration_score(Some(1e12), Some(0), 10.0), i32::MAX);
    }

    #[test]
    fn test_best_match_prefers_synced_then_duration() {
        let records = vec![
            record(1, Some(200.0), false),
            record(2, Some(205.0), true),
            record(3, Some(201.0), true),
        ];
        assert_eq!(best_match(records, Some(200), 10.0).unwrap().id, 3);
    }

    #[test]
    fn test_best_match_skips_records_without_lyrics() {
        let mut empty = record(1, Some(200.0), false);
        empty.plain_lyrics = None;
        assert!(best_match(vec![empty], Some(200), 1.0).is_none());
    }

    #[test]
    fn test_duration_within() {
        let r = record(1, Some(181.9), true);
        assert!(r.duration_within(180, 2.0));
        assert!(!r.duration_within(184, 2.0));
        assert!(!record(2, None, true).duration_within(180, 2.0));
    }
}
