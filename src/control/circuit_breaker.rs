//! Windowed failure-ratio breaker.
//!
//! Only freshly executed lines feed the breaker; replayed lines never do.
//! Outcomes are counted in a window of `rows_to_inform` executions. Once a
//! window holds more than a tenth of its size, the run trips if it has no
//! successes at all or its failure/success ratio exceeds `rate_to_stop`.
//! A window size of 0 disables evaluation and progress reporting.

use crate::models::{ProcessConfig, Status};

/// Minimum share of a window that must be filled before evaluating.
const MIN_SAMPLE_FRACTION: f64 = 0.1;

/// The failure ratio crossed the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerTrip {
    pub failures: u64,
    pub successes: u64,
    pub rate_to_stop: f64,
}

/// Emitted every time a full window of executions has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    /// Executions observed so far in this run
    pub executed: u64,
    pub window_successes: u64,
    pub window_failures: u64,
    pub total_failures: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    rows_to_inform: u64,
    rate_to_stop: f64,
    window_successes: u64,
    window_failures: u64,
    executed: u64,
    total_failures: u64,
}

impl CircuitBreaker {
    pub fn new(rows_to_inform: u64, rate_to_stop: f64) -> Self {
        Self {
            rows_to_inform,
            rate_to_stop,
            window_successes: 0,
            window_failures: 0,
            executed: 0,
            total_failures: 0,
        }
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        Self::new(config.rows_to_inform, config.rate_to_stop)
    }

    pub fn is_enabled(&self) -> bool {
        self.rows_to_inform > 0
    }

    /// Count one execution outcome and evaluate the current window.
    pub fn record(&mut self, status: Status) -> Option<BreakerTrip> {
        self.executed += 1;
        match status {
            Status::Ok => self.window_successes += 1,
            Status::Er => {
                self.window_failures += 1;
                self.total_failures += 1;
            }
        }
        self.evaluate()
    }

    fn evaluate(&self) -> Option<BreakerTrip> {
        if !self.is_enabled() {
            return None;
        }

        let sample = (self.window_successes + self.window_failures) as f64;
        if sample <= self.rows_to_inform as f64 * MIN_SAMPLE_FRACTION {
            return None;
        }

        let tripped = self.window_successes == 0
            || self.window_failures as f64 / self.window_successes as f64 > self.rate_to_stop;
        tripped.then_some(BreakerTrip {
            failures: self.window_failures,
            successes: self.window_successes,
            rate_to_stop: self.rate_to_stop,
        })
    }

    /// Close the window if it is full, returning its report.
    pub fn roll_window(&mut self) -> Option<WindowReport> {
        if !self.is_enabled() || self.executed % self.rows_to_inform != 0 {
            return None;
        }

        let report = WindowReport {
            executed: self.executed,
            window_successes: self.window_successes,
            window_failures: self.window_failures,
            total_failures: self.total_failures,
        };
        self.window_successes = 0;
        self.window_failures = 0;
        Some(report)
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Failures over the whole run; not reset with the window.
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_trips_or_reports() {
        let mut breaker = CircuitBreaker::new(0, 0.1);
        for _ in 0..50 {
            assert!(breaker.record(Status::Er).is_none());
            assert!(breaker.roll_window().is_none());
        }
        assert_eq!(breaker.total_failures(), 50);
    }

    #[test]
    fn test_waits_for_minimum_sample() {
        // 10% of 100 is 10: the 11th outcome is the first evaluated
        let mut breaker = CircuitBreaker::new(100, 0.5);
        for _ in 0..10 {
            assert!(breaker.record(Status::Er).is_none());
        }
        let trip = breaker.record(Status::Er).unwrap();
        assert_eq!(trip.failures, 11);
        assert_eq!(trip.successes, 0);
    }

    #[test]
    fn test_ratio_threshold_is_strict() {
        let mut breaker = CircuitBreaker::new(10, 0.5);
        assert!(breaker.record(Status::Ok).is_none());
        // 1 failure / 2 successes == 0.5, not above
        assert!(breaker.record(Status::Ok).is_none());
        assert!(breaker.record(Status::Er).is_none());
        // 2 / 2 == 1.0 > 0.5
        let trip = breaker.record(Status::Er).unwrap();
        assert_eq!(trip.failures, 2);
        assert_eq!(trip.successes, 2);
    }

    #[test]
    fn test_trips_on_zero_successes_even_with_high_threshold() {
        let mut breaker = CircuitBreaker::new(10, 1000.0);
        assert!(breaker.record(Status::Er).is_none());
        assert!(breaker.record(Status::Er).is_some());
    }

    #[test]
    fn test_window_rolls_and_keeps_cumulative_failures() {
        let mut breaker = CircuitBreaker::new(4, 1.0);
        assert!(breaker.record(Status::Ok).is_none());
        assert!(breaker.roll_window().is_none());
        assert!(breaker.record(Status::Ok).is_none());
        assert!(breaker.record(Status::Er).is_none());
        assert!(breaker.record(Status::Ok).is_none());

        let report = breaker.roll_window().unwrap();
        assert_eq!(report.executed, 4);
        assert_eq!(report.window_successes, 3);
        assert_eq!(report.window_failures, 1);

        // fresh window with no successes: one failure already exceeds 0.4
        let trip = breaker.record(Status::Er).unwrap();
        assert_eq!(trip.failures, 1);
        assert_eq!(trip.successes, 0);
        assert_eq!(breaker.total_failures(), 2);
    }
}
