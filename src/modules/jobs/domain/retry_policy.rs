//! Retry decisions for failed scrape jobs
//!
//! Pure logic: given how many retries a job has already used and its ceiling,
//! decide whether it goes back to `pending` after an exponential backoff or
//! fails permanently.

use std::time::Duration;

/// Outcome of applying the policy to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue with the incremented retry count once `delay` has elapsed
    Retry { retry_count: i32, delay: Duration },
    /// Retries exhausted
    PermanentFailure,
}

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry; doubles for each later one
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    pub fn decide(&self, retry_count: i32, max_retries: i32) -> RetryDecision {
        if retry_count < max_retries {
            RetryDecision::Retry {
                retry_count: retry_count + 1,
                delay: self.calculate_delay(retry_count),
            }
        } else {
            RetryDecision::PermanentFailure
        }
    }

    /// `base * 2^retry_count`, capped at `max_delay`
    pub fn calculate_delay(&self, retry_count: i32) -> Duration {
        let exponent = retry_count.clamp(0, 31) as u32;
        self.base_delay
            .checked_mul(2u32.saturating_pow(exponent))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Error text stored on a job that will be retried
    pub fn retry_message(attempt: i32, max_retries: i32, error: &str) -> String {
        format!("Attempt {}/{} failed: {}", attempt, max_retries + 1, error)
    }

    /// Error text stored on a job that has failed for good
    pub fn final_message(max_retries: i32, error: &str) -> String {
        format!("Failed after {} retries: {}", max_retries, error)
    }
}
