//! Wait-time estimation from a rolling window of recent job durations.

use std::collections::VecDeque;

/// A simple linear predictor: estimated wait = queue position times the
/// average of the most recent job durations. No smoothing, no outlier
/// rejection — position 0 always estimates 0.
pub struct EtaEstimator {
    window: VecDeque<f64>,
    capacity: usize,
    default_job_secs: u64,
}

impl EtaEstimator {
    pub fn new(capacity: usize, default_job_secs: u64) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            default_job_secs,
        }
    }

    /// Record one finished job's wall-clock duration, evicting the oldest
    /// sample beyond capacity.
    pub fn record(&mut self, seconds: f64) {
        self.window.push_back(seconds);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    /// Estimated seconds of wait for a job at the given 1-based position.
    ///
    /// Truncates toward zero, and falls back to a fixed per-job cost while
    /// the window is empty.
    pub fn estimate(&self, position: usize) -> u64 {
        if self.window.is_empty() {
            return position as u64 * self.default_job_secs;
        }

        let avg = self.window.iter().sum::<f64>() / self.window.len() as f64;
        (position as f64 * avg) as u64
    }

    pub fn sample_count(&self) -> usize {
        self.window.len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_uses_default_cost() {
        let eta = EtaEstimator::new(20, 15);
        assert_eq!(eta.estimate(1), 15);
        assert_eq!(eta.estimate(3), 45);
    }

    #[test]
    fn estimate_uses_window_average() {
        let mut eta = EtaEstimator::new(20, 15);
        eta.record(10.0);
        eta.record(20.0);
        // avg = 15.0
        assert_eq!(eta.estimate(1), 15);
        assert_eq!(eta.estimate(2), 30);
    }

    #[test]
    fn estimate_truncates_toward_zero() {
        let mut eta = EtaEstimator::new(20, 15);
        eta.record(7.9);
        assert_eq!(eta.estimate(1), 7);
        assert_eq!(eta.estimate(3), 23); // 23.7 truncated
    }

    #[test]
    fn estimate_is_monotone_in_position() {
        let mut eta = EtaEstimator::new(20, 15);
        eta.record(3.5);
        eta.record(12.25);
        let estimates: Vec<u64> = (0..10).map(|p| eta.estimate(p)).collect();
        assert!(estimates.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(eta.estimate(0), 0);
    }

    #[test]
    fn window_evicts_oldest_beyond_capacity() {
        let mut eta = EtaEstimator::new(3, 15);
        for secs in [100.0, 1.0, 1.0, 1.0] {
            eta.record(secs);
        }
        // The 100s outlier fell out of the window.
        assert_eq!(eta.sample_count(), 3);
        assert_eq!(eta.estimate(1), 1);
    }
}
