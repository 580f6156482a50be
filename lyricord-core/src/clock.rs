//! Virtual playback clock extrapolated from the last known anchor.

use tokio::time::Instant;

/// Last known exact correspondence between wall-clock time and playback position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    pub wall_time: Instant,
    /// Playback position in seconds at `wall_time`
    pub position: f64,
}

/// Playback clock that advances in real time from its anchor.
///
/// The clock never reads the system time itself; callers pass `now`. Elapsed
/// time saturates at zero, so a `now` earlier than the anchor yields the
/// anchor position rather than moving backward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualClock {
    anchor: ClockAnchor,
}

impl VirtualClock {
    #[must_use]
    pub const fn new(wall_time: Instant, position: f64) -> Self {
        Self {
            anchor: ClockAnchor {
                wall_time,
                position,
            },
        }
    }

    /// Playback position in seconds at `now`
    #[must_use]
    pub fn extrapolate(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.anchor.wall_time);
        self.anchor.position + elapsed.as_secs_f64()
    }

    /// Replace the anchor in one step
    pub fn reset_anchor(&mut self, wall_time: Instant, position: f64) {
        self.anchor = ClockAnchor {
            wall_time,
            position,
        };
    }

    #[must_use]
    pub const fn anchor(&self) -> ClockAnchor {
        self.anchor
    }
}
