//! Caller-side frame throttling.
//!
//! Post-processing never drops frames itself. Callers fed faster than they can
//! process use a [`FrameThrottle`] to skip frames that arrive before a minimum
//! interval has elapsed since the last accepted one.

use std::time::{Duration, Instant};

/// Default spacing between accepted frames.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Accepts at most one frame per `min_interval` of monotonic time.
#[derive(Clone, Debug)]
pub struct FrameThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl FrameThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Returns true and records `now` if the frame should be processed.
    ///
    /// Instants earlier than the last accepted one are rejected.
    pub fn should_run_at(&mut self, now: Instant) -> bool {
        let accept = match self.last {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed >= self.min_interval),
        };
        if accept {
            self.last = Some(now);
        }
        accept
    }

    /// [`should_run_at`](Self::should_run_at) with the current instant.
    pub fn should_run(&mut self) -> bool {
        self.should_run_at(Instant::now())
    }

    /// Forgets the last accepted frame so the next one always runs.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
