//! Time-ordered lyric lines and active-line lookup.

use crate::error::{CoreError, Result};
use std::fmt;

/// A single lyric line, active from `timestamp` seconds until the next line starts.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    /// Start time in seconds
    pub timestamp: f64,
    pub text: String,
}

impl LyricLine {
    pub fn new(timestamp: f64, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

impl fmt::Display for LyricLine {
    /// Formats as `[mm:ss.xx] text`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", format_timestamp(self.timestamp), self.text)
    }
}

/// Format seconds as `mm:ss.xx`. Negative and non-finite values render as `00:00.00`.
#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    let centis = if seconds.is_finite() && seconds > 0.0 {
        // Rounded, non-negative and finite, so the conversion cannot wrap.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let c = (seconds * 100.0).round() as u64;
        c
    } else {
        0
    };
    format!(
        "{:02}:{:02}.{:02}",
        centis / 6000,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Immutable, timestamp-sorted collection of lyric lines.
///
/// Lookups assume the ordering holds and never re-sort. Construct through
/// [`LyricIndex::new`] to validate caller-supplied lines or
/// [`LyricIndex::from_unsorted`] to sort parser output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricIndex {
    lines: Vec<LyricLine>,
}

impl LyricIndex {
    /// An index with no lines. Every lookup returns `None`.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build an index from lines that must already be in ascending timestamp order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLyrics`] if a timestamp is negative or not
    /// finite, or if a line starts before the line preceding it.
    pub fn new(lines: Vec<LyricLine>) -> Result<Self> {
        for (i, line) in lines.iter().enumerate() {
            if !line.timestamp.is_finite() || line.timestamp < 0.0 {
                return Err(CoreError::InvalidLyrics {
                    index: i,
                    reason: format!("timestamp {} is not a non-negative number", line.timestamp),
                });
            }
            if i > 0 && line.timestamp < lines[i - 1].timestamp {
                return Err(CoreError::InvalidLyrics {
                    index: i,
                    reason: format!(
                        "timestamp {} is earlier than previous line at {}",
                        line.timestamp,
                        lines[i - 1].timestamp
                    ),
                });
            }
        }
        Ok(Self { lines })
    }

    /// Build an index from arbitrary lines, stable-sorting by timestamp.
    ///
    /// Lines with non-finite timestamps are dropped and negative timestamps
    /// are clamped to zero. Lines sharing a timestamp keep their relative order.
    #[must_use]
    pub fn from_unsorted(lines: Vec<LyricLine>) -> Self {
        let mut lines: Vec<LyricLine> = lines
            .into_iter()
            .filter(|l| l.timestamp.is_finite())
            .map(|mut l| {
                l.timestamp = l.timestamp.max(0.0);
                l
            })
            .collect();
        lines.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { lines }
    }

    /// Find the line active at `position` seconds.
    ///
    /// This is the line with the greatest timestamp strictly less than
    /// `position`. When several lines share that timestamp, the one inserted
    /// last wins. Returns `None` for an empty index, for a position at or
    /// before the first line, and for NaN.
    #[must_use]
    pub fn active_line(&self, position: f64) -> Option<&LyricLine> {
        let started = self.lines.partition_point(|line| line.timestamp < position);
        started.checked_sub(1).map(|i| &self.lines[i])
    }

    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&LyricLine> {
        self.lines.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&LyricLine> {
        self.lines.last()
    }
}

/// Free-function form of [`LyricIndex::active_line`].
#[must_use]
pub fn active_line(index: &LyricIndex, position: f64) -> Option<&LyricLine> {
    index.active_line(position)
}
