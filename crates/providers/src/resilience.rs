//! Retry and timeout decorators for provider calls.
//!
//! These wrap any fallible async operation, so providers compose them
//! around their request code instead of inheriting the behavior.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{FetchError, RetryClass};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Default timeout used by [`with_timeout`] callers that do not pick one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: u32,
    /// Retry errors classified as [`RetryClass::NonRetryable`] as well.
    ///
    /// On by default, so a revoked credential still walks the full
    /// backoff schedule before failing.
    pub retry_non_retryable: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retry_non_retryable: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// ```
    /// use std::time::Duration;
    /// use metricsdeck_providers::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
    /// assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry.min(16));
        self.base_delay.saturating_mul(factor)
    }

    fn should_retry(&self, error: &FetchError) -> bool {
        self.retry_non_retryable || error.retry_class() == RetryClass::Retryable
    }
}

/// Run `operation`, retrying failures with exponential backoff.
///
/// After the last attempt the error is wrapped in
/// [`FetchError::RetriesExhausted`] and returned as terminal. An error the
/// policy declines to retry is returned unchanged after its single attempt.
pub async fn with_retry<F, Fut, T>(
    provider: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    debug!(provider, retries = retry, "fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !policy.should_retry(&error) {
                    debug!(provider, error = %error, "fetch failed, not retrying");
                    return Err(error);
                }
                if retry >= policy.max_retries {
                    return Err(FetchError::RetriesExhausted {
                        provider: provider.to_string(),
                        attempts: retry + 1,
                        source: Box::new(error),
                    });
                }

                let delay = policy.delay_for(retry);
                warn!(
                    provider,
                    delay_ms = delay.as_millis() as u64,
                    retries_remaining = policy.max_retries - retry,
                    error = %error,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}

/// Race `operation` against a timer.
pub async fn with_timeout<Fut, T>(
    provider: &str,
    timeout: Duration,
    operation: Fut,
) -> Result<T, FetchError>
where
    Fut: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            provider: provider.to_string(),
            after_ms: timeout.as_millis() as u64,
        }),
    }
}
