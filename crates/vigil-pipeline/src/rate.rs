use std::time::{Duration, Instant};

/// Windowed throughput counter.  The rate is recomputed once per window
/// and held in between, so an overlay reads a steady number.
#[derive(Debug, Clone)]
pub struct RateCounter {
    window: Duration,
    window_start: Instant,
    count: u64,
    rate: f64,
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl RateCounter {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    /// Counter whose first window opens at `start` (tests, replay).
    pub fn starting_at(window: Duration, start: Instant) -> Self {
        Self {
            window,
            window_start: start,
            count: 0,
            rate: 0.0,
        }
    }

    /// Count one event now and return the current rate.
    pub fn update(&mut self) -> f64 {
        self.update_at(Instant::now())
    }

    pub fn update_at(&mut self, now: Instant) -> f64 {
        self.count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window && !elapsed.is_zero() {
            self.rate = self.count as f64 / elapsed.as_secs_f64();
            self.count = 0;
            self.window_start = now;
        }
        self.rate
    }

    /// Last computed rate, 0.0 before the first window closes.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}
