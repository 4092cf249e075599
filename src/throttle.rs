//! Inference cadence control.
//!
//! The classifier is far slower than JPEG decode, so it runs at a fixed
//! wall-clock cadence regardless of how fast frames arrive.
//!
//! Failure handling is a fixed backoff: a failed call leaves the interval
//! timer untouched and closes the gate for `failure_backoff`. A zero backoff
//! retries on the next frame.

use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct InferenceThrottle {
    interval: Duration,
    failure_backoff: Duration,
    last_refresh: Option<Instant>,
    retry_after: Option<Instant>,
}

impl InferenceThrottle {
    pub fn new(interval: Duration) -> Self {
        Self::with_backoff(interval, DEFAULT_FAILURE_BACKOFF)
    }

    pub fn with_backoff(interval: Duration, failure_backoff: Duration) -> Self {
        Self {
            interval,
            failure_backoff,
            last_refresh: None,
            retry_after: None,
        }
    }

    /// True when the classifier should run for a frame seen at `now`.
    pub fn should_refresh(&self, now: Instant) -> bool {
        if let Some(retry_after) = self.retry_after {
            if now < retry_after {
                return false;
            }
        }
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// The classifier produced a result at `now`.
    pub fn record_refresh(&mut self, now: Instant) {
        self.last_refresh = Some(now);
        self.retry_after = None;
    }

    /// The classifier failed at `now`. Does not reset the interval timer.
    pub fn record_failure(&mut self, now: Instant) {
        self.retry_after = Some(now + self.failure_backoff);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }
}

impl Default for InferenceThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, offset: u64) -> Instant {
        base + Duration::from_millis(offset)
    }

    /// Drive the throttle the way the main loop does, refreshing whenever allowed.
    fn refreshes_at(throttle: &mut InferenceThrottle, base: Instant, offsets: &[u64]) -> Vec<u64> {
        let mut fired = Vec::new();
        for &offset in offsets {
            let now = ms(base, offset);
            if throttle.should_refresh(now) {
                throttle.record_refresh(now);
                fired.push(offset);
            }
        }
        fired
    }

    #[test]
    fn fires_first_then_once_per_interval() {
        let base = Instant::now();
        let mut throttle = InferenceThrottle::new(Duration::from_secs(1));
        let fired = refreshes_at(&mut throttle, base, &[0, 500, 1000, 1600]);
        assert_eq!(fired, vec![0, 1000]);
    }

    #[test]
    fn cadence_is_independent_of_frame_rate() {
        let base = Instant::now();
        let mut throttle = InferenceThrottle::new(Duration::from_secs(1));
        // 30 fps for three seconds.
        let offsets: Vec<u64> = (0..90).map(|i| i * 33).collect();
        let fired = refreshes_at(&mut throttle, base, &offsets);
        assert_eq!(fired.len(), 3);
    }

    #[test]
    fn failure_does_not_reset_interval_timer() {
        let base = Instant::now();
        let mut throttle =
            InferenceThrottle::with_backoff(Duration::from_secs(1), Duration::from_millis(200));

        assert!(throttle.should_refresh(ms(base, 0)));
        throttle.record_refresh(ms(base, 0));

        assert!(throttle.should_refresh(ms(base, 1000)));
        throttle.record_failure(ms(base, 1000));
        assert_eq!(throttle.last_refresh(), Some(ms(base, 0)));

        assert!(!throttle.should_refresh(ms(base, 1100)));
        assert!(throttle.should_refresh(ms(base, 1200)));
    }

    #[test]
    fn zero_backoff_retries_next_frame() {
        let base = Instant::now();
        let mut throttle = InferenceThrottle::with_backoff(Duration::from_secs(1), Duration::ZERO);

        assert!(throttle.should_refresh(ms(base, 0)));
        throttle.record_failure(ms(base, 0));
        assert!(throttle.should_refresh(ms(base, 33)));
    }

    #[test]
    fn success_after_failure_restarts_interval() {
        let base = Instant::now();
        let mut throttle = InferenceThrottle::default();

        throttle.record_failure(ms(base, 0));
        assert!(throttle.should_refresh(ms(base, 600)));
        throttle.record_refresh(ms(base, 600));
        assert!(!throttle.should_refresh(ms(base, 1500)));
        assert!(throttle.should_refresh(ms(base, 1600)));
    }
}
