//! Bounded exponential backoff for failed jobs.

use std::time::Duration;

use rand::Rng;

use crate::config::Config;

/// Jitter added on top of the backoff, as a fraction of it.
const JITTER_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: i32,
}

impl RetryPolicy {
    pub fn new(base: Duration, max: Duration, max_attempts: i32) -> Self {
        Self {
            base,
            max,
            max_attempts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.job_backoff_base_secs),
            Duration::from_secs(config.job_backoff_max_secs),
            config.job_max_attempts,
        )
    }

    /// Whether a job that has used `attempts` attempts may run again.
    pub fn should_retry(&self, attempts: i32) -> bool {
        attempts < self.max_attempts
    }

    /// `min(base * 2^(attempt - 1), max)`, without jitter.
    pub fn backoff(&self, attempt: i32) -> Duration {
        let exponent = attempt.saturating_sub(1).clamp(0, 30) as u32;
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Backoff plus up to 10% random jitter, so retries of jobs that failed
    /// together do not all wake at the same instant.
    pub fn delay(&self, attempt: i32) -> Duration {
        let backoff = self.backoff(attempt);
        let jitter = backoff.mul_f64(rand::rng().random_range(0.0..=JITTER_RATIO));
        backoff + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(2), Duration::from_secs(300), 5)
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(32));
        assert_eq!(policy.backoff(9), Duration::from_secs(300));
        assert_eq!(policy.backoff(1_000), Duration::from_secs(300));
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        assert_eq!(policy().backoff(0), Duration::from_secs(2));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = policy();
        for attempt in 1..=6 {
            let base = policy.backoff(attempt);
            let delay = policy.delay(attempt);
            assert!(delay >= base);
            assert!(delay <= base.mul_f64(1.0 + JITTER_RATIO) + Duration::from_millis(1));
        }
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = policy();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }
}
