//! Per-attempt event clock.
//!
//! Every attempt captures exactly one baseline instant; all event offsets of
//! that attempt are measured from it. Offsets keep the full resolution of
//! `std::time::Instant` and are only rounded to milliseconds for display.

use std::time::{Duration, Instant};

/// Monotonic baseline for one request attempt.
#[derive(Debug, Clone, Copy)]
pub struct EventClock {
    baseline: Instant,
}

impl EventClock {
    /// Captures the current instant as the baseline.
    pub fn start() -> Self {
        Self {
            baseline: Instant::now(),
        }
    }

    /// The instant captured by [`EventClock::start`].
    pub fn baseline(&self) -> Instant {
        self.baseline
    }

    /// Time elapsed since the baseline. Never negative.
    pub fn elapsed(&self) -> Duration {
        self.offset_of(Instant::now())
    }

    /// Offset of an arbitrary instant relative to the baseline, saturating at zero
    /// for instants taken before the baseline.
    pub fn offset_of(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.baseline)
    }
}

/// Converts an offset to whole milliseconds for display (truncating, like the
/// millisecond view of a duration everywhere else in the output).
pub fn as_display_millis(offset: Duration) -> u128 {
    offset.as_millis()
}
