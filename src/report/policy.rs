//! Poll cadence for report jobs.

use std::time::Duration;

use crate::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_INTERVAL, DEFAULT_POLL_MULTIPLIER, DEFAULT_POLL_TIMEOUT,
};

/// How often and for how long a report job is polled.
///
/// # Default Values
///
/// - `initial_interval`: 500 ms
/// - `multiplier`: 1.5
/// - `max_interval`: 5 seconds
/// - `timeout`: 60 seconds
///
/// # Delay Calculation
///
/// ```text
/// delay(n) = min(initial_interval * multiplier^n, max_interval)
/// ```
///
/// The last delay is shortened so no sleep runs past the budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    initial_interval: Duration,
    multiplier: f32,
    max_interval: Duration,
    timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_POLL_INTERVAL,
            multiplier: DEFAULT_POLL_MULTIPLIER,
            max_interval: DEFAULT_POLL_MAX_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollPolicy {
    /// Creates a policy.
    ///
    /// A multiplier below 1.0 is raised to 1.0 and an interval cap below the
    /// initial interval is raised to it, so delays never shrink.
    #[must_use]
    pub fn new(initial_interval: Duration, multiplier: f32, max_interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: if multiplier.is_finite() { multiplier.max(1.0) } else { 1.0 },
            max_interval: max_interval.max(initial_interval),
            timeout,
        }
    }

    /// Default cadence with a different total budget.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Delay before the first poll.
    #[must_use]
    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    /// Growth factor per pending answer.
    #[must_use]
    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    /// Upper bound of a single delay.
    #[must_use]
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Total wait budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Delay following `current`.
    #[must_use]
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f32(self.multiplier).min(self.max_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_values() {
        let policy = PollPolicy::default();
        assert_eq!(policy.initial_interval(), Duration::from_millis(500));
        assert_eq!(policy.max_interval(), Duration::from_secs(5));
        assert_eq!(policy.timeout(), Duration::from_secs(60));
        assert!((policy.multiplier() - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_next_interval_grows_then_caps() {
        let policy = PollPolicy::default();
        let second = policy.next_interval(policy.initial_interval());
        assert_eq!(second, Duration::from_millis(750));
        assert_eq!(policy.next_interval(Duration::from_secs(4)), Duration::from_secs(5));
        assert_eq!(policy.next_interval(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_new_clamps_shrinking_settings() {
        let policy = PollPolicy::new(
            Duration::from_secs(2),
            0.5,
            Duration::from_secs(1),
            Duration::from_secs(10),
        );
        assert!((policy.multiplier() - 1.0).abs() < f32::EPSILON);
        assert_eq!(policy.max_interval(), Duration::from_secs(2));
        assert_eq!(policy.next_interval(Duration::from_secs(2)), Duration::from_secs(2));
    }
}
