//! Retry policy with exponential backoff
//!
//! A failed scrape attempt is retried only when three things hold: the
//! attempt bound has not been reached, the error is classified as
//! retryable, and cancellation has not been requested (the task loop checks
//! the last one). Backoff grows exponentially from `initial_delay` up to
//! `max_delay`, with optional jitter to avoid hammering a recovering
//! provider from several schedules at once. With jitter disabled the policy
//! is fully deterministic, which keeps tests reproducible.

use crate::config::RetryConfig;
use crate::error::ScrapeError;
use rand::Rng;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, provider overload) should return
/// `true`. Permanent failures (broken selector configuration, provider
/// redesign) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ScrapeError {
    fn is_retryable(&self) -> bool {
        match self {
            // Network hiccups and per-attempt deadlines are worth retrying
            ScrapeError::Transient(_) | ScrapeError::Timeout(_) => true,
            // Retrying cannot fix a misconfigured scraper
            ScrapeError::Permanent(_) => false,
            // Cancellation ends the task, never re-runs it
            ScrapeError::Cancelled => false,
        }
    }
}

/// Decides whether and when a failed task attempt should be retried
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from backoff configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide whether attempt number `attempt` (1-based) should be retried
    ///
    /// Returns the backoff to sleep before the next attempt, or None when
    /// the task should become terminal.
    pub fn should_retry(
        &self,
        attempt: u32,
        max_attempts: u32,
        error: &ScrapeError,
    ) -> Option<Duration> {
        if attempt >= max_attempts {
            return None;
        }
        if !error.is_retryable() {
            return None;
        }
        Some(self.backoff_for(attempt))
    }

    /// Backoff before the retry that follows attempt number `attempt`
    ///
    /// `initial_delay * multiplier^(attempt-1)`, capped at `max_delay`,
    /// jittered when configured.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30);
        let raw = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent as i32);
        let capped = if raw >= self.config.max_delay.as_secs_f64() {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(raw)
        };

        if self.config.jitter {
            add_jitter(capped)
        } else {
            capped
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic_policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        })
    }

    #[test]
    fn transient_and_timeout_are_retryable() {
        assert!(ScrapeError::transient("connection reset").is_retryable());
        assert!(ScrapeError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn permanent_and_cancelled_are_not_retryable() {
        assert!(!ScrapeError::permanent("selector gone").is_retryable());
        assert!(!ScrapeError::Cancelled.is_retryable());
    }

    #[test]
    fn never_retries_at_attempt_bound() {
        let policy = deterministic_policy();
        let err = ScrapeError::transient("flaky");

        assert!(policy.should_retry(3, 3, &err).is_none());
        assert!(policy.should_retry(4, 3, &err).is_none());
        assert!(policy.should_retry(2, 3, &err).is_some());
    }

    #[test]
    fn never_retries_permanent_errors_regardless_of_remaining_attempts() {
        let policy = deterministic_policy();
        let err = ScrapeError::permanent("malformed selector configuration");

        assert!(policy.should_retry(1, 5, &err).is_none());
    }

    #[test]
    fn single_attempt_tasks_never_retry() {
        let policy = deterministic_policy();
        let err = ScrapeError::transient("flaky");

        // max_retries = 0 means max_attempts = 1
        assert!(policy.should_retry(1, 1, &err).is_none());
    }

    #[test]
    fn backoff_doubles_per_attempt_without_jitter() {
        let policy = deterministic_policy();

        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let policy = RetryPolicy::new(RetryConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            backoff_multiplier: 10.0,
            jitter: false,
        });

        assert_eq!(policy.backoff_for(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(200));
        // Huge exponents must not overflow into a panic or a zero delay
        assert_eq!(policy.backoff_for(100), Duration::from_millis(200));
    }

    #[test]
    fn should_retry_returns_the_backoff_for_the_failed_attempt() {
        let policy = deterministic_policy();
        let err = ScrapeError::transient("flaky");

        assert_eq!(
            policy.should_retry(2, 5, &err),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn add_jitter_stays_within_bounds_over_many_iterations() {
        let delay = Duration::from_millis(50);
        for i in 0..200 {
            let jittered = add_jitter(delay);
            assert!(
                jittered >= delay,
                "iteration {i}: jittered {jittered:?} < base delay {delay:?}"
            );
            assert!(
                jittered <= delay * 2,
                "iteration {i}: jittered {jittered:?} > 2x base delay {:?}",
                delay * 2
            );
        }
    }

    #[test]
    fn add_jitter_on_zero_delay_returns_zero() {
        assert_eq!(add_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn jittered_backoff_stays_within_double_the_capped_delay() {
        let policy = RetryPolicy::new(RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: true,
        });

        for attempt in 1..=6 {
            let backoff = policy.backoff_for(attempt);
            assert!(backoff <= Duration::from_secs(2), "attempt {attempt}");
        }
    }
}
