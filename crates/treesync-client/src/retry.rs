//! Timeout growth and backoff for transient request failures.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::fetch::FetchOutcome;

/// Retry schedule for one request.
///
/// Attempt `n` (0-based) gets a deadline of `base_timeout + n * timeout_increment`.
/// After a retryable failure on attempt `n` the policy sleeps
/// `(n + 1) * backoff_unit` before trying again, up to `max_retries` extra
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_timeout: Duration,
    pub timeout_increment: Duration,
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_millis(15_000),
            timeout_increment: Duration::from_millis(5_000),
            max_retries: 2,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// What [`RetryPolicy::run`] ended with.
#[derive(Debug)]
pub struct RetryReport<T> {
    /// Outcome of the last attempt.
    pub outcome: FetchOutcome<T>,
    /// Attempts made, at least 1.
    pub attempts: u32,
    /// `true` when the last attempt still failed transiently and no retries
    /// were left.
    pub exhausted: bool,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt with `timeout`.
    #[must_use]
    pub fn single(timeout: Duration) -> Self {
        Self {
            base_timeout: timeout,
            timeout_increment: Duration::ZERO,
            max_retries: 0,
            backoff_unit: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_timeout_increment(mut self, increment: Duration) -> Self {
        self.timeout_increment = increment;
        self
    }

    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Deadline for attempt `attempt` (0-based).
    #[must_use]
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout + self.timeout_increment.saturating_mul(attempt)
    }

    /// Pause after a failed attempt `attempt` (0-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt.saturating_add(1))
    }

    /// Total attempts this policy allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `op` until it yields a non-retryable outcome or retries run out.
    ///
    /// `op` receives the 0-based attempt number and the deadline it must
    /// enforce.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryReport<T>
    where
        F: FnMut(u32, Duration) -> Fut,
        Fut: Future<Output = FetchOutcome<T>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = op(attempt, self.timeout_for(attempt)).await;
            if !outcome.is_retryable() || attempt >= self.max_retries {
                let exhausted = outcome.is_retryable();
                return RetryReport {
                    outcome,
                    attempts: attempt + 1,
                    exhausted,
                };
            }

            let backoff = self.backoff_for(attempt);
            debug!(
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "backing off before retry"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
