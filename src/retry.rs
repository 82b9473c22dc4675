//! Bounded Retry
//!
//! Runs an async operation up to a fixed number of attempts. A classifier
//! decides after each failure whether another attempt is worthwhile;
//! terminal errors are returned immediately.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Retry settings. The attempt count includes the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` of zero is treated as one.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Sleep between attempts, doubling from `initial` up to `max`.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based).
    fn backoff(&self, retry: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempts run out. The error returned is always the
    /// one from the final attempt.
    pub async fn run<T, E, F, Fut, P>(&self, mut is_retryable: P, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: Debug,
    {
        let mut attempts_remaining = self.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            attempts_remaining -= 1;

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) {
                debug!("Attempt {} failed with terminal error: {:?}", attempt, err);
                return Err(err);
            }

            if attempts_remaining == 0 {
                warn!("Giving up after {} attempts: {:?}", attempt, err);
                return Err(err);
            }

            let delay = self.backoff(attempt);
            debug!(
                "Attempt {} failed ({:?}), retrying in {:?} ({} left)",
                attempt, err, delay, attempts_remaining
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Run `operation` at most `max_attempts` times with no delay between
/// attempts. See [`RetryPolicy::run`].
pub async fn retry<T, E, F, Fut, P>(max_attempts: usize, is_retryable: P, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: Debug,
{
    RetryPolicy::new(max_attempts).run(is_retryable, operation).await
}
