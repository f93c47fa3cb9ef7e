//! Retry policy with linear backoff and an injectable sleep

use crate::error::SummarizerError;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Sleep used between attempts; swapped out in tests to avoid wall-clock waits
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Tokio-backed sleeper
pub fn tokio_sleeper() -> Sleeper {
    Arc::new(|delay: Duration| -> BoxFuture<'static, ()> { Box::pin(tokio::time::sleep(delay)) })
}

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Stop at the first error that `is_retryable()` rejects
    pub fail_fast: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            fail_fast: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            fail_fast: false,
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based): `retry * base_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }

    /// Whether another attempt is allowed after `retries_done` retries
    pub fn can_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Whether `error` should be retried after `retries_done` retries
    ///
    /// Every failure is retried up to the limit unless `fail_fast` is set.
    pub fn should_retry(&self, error: &SummarizerError, retries_done: u32) -> bool {
        self.can_retry(retries_done) && (!self.fail_fast || error.is_retryable())
    }
}
