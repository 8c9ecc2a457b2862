use std::time::{Duration, Instant};

use crate::shared::constants::FPS_UPDATE_INTERVAL_SECS;

/// Windowed frame-rate counter.
///
/// Frames are counted until the window reaches `interval`; the rate is then
/// `count / elapsed` and a new window starts. The reported value is therefore
/// smoothed over the window rather than per frame.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    interval: Duration,
    count: u32,
    window_start: Instant,
    current: f64,
}

impl FpsMeter {
    pub fn new(start: Instant) -> Self {
        Self::with_interval(Duration::from_secs_f64(FPS_UPDATE_INTERVAL_SECS), start)
    }

    pub fn with_interval(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            count: 0,
            window_start: start,
            current: 0.0,
        }
    }

    /// Counts one frame at `now`; returns the new rate when a window closes.
    pub fn record(&mut self, now: Instant) -> Option<f64> {
        self.count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        self.current = self.count as f64 / elapsed.as_secs_f64();
        self.count = 0;
        self.window_start = now;
        Some(self.current)
    }

    /// Last computed rate, 0 before the first window closes.
    pub fn current(&self) -> f64 {
        self.current
    }
}
