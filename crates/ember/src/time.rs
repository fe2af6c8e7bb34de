//! # Frame Time
//!
//! The [`Time`] resource is refreshed by the App at the start of every
//! frame.

use std::time::{Duration, Instant};

/// Upper bound on one frame's delta, so a stall does not explode
/// simulation steps.
pub const MAX_DELTA: Duration = Duration::from_millis(100);

/// Frame clock resource.
#[derive(Clone, Copy, Debug)]
pub struct Time {
    frame: u64,
    delta: Duration,
    elapsed: Duration,
    last_tick: Instant,
}

impl Time {
    /// Creates a clock at frame 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame: 0,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            last_tick: Instant::now(),
        }
    }

    /// Advances to the next frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now.duration_since(self.last_tick).min(MAX_DELTA);
        self.last_tick = now;
        self.elapsed += self.delta;
        self.frame += 1;
    }

    /// Number of the current frame; 1 during the first update.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Clamped time since the previous frame.
    #[inline]
    #[must_use]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Delta in seconds.
    #[inline]
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Sum of all clamped deltas.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}
