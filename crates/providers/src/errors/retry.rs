/// Classification for retry policy.
///
/// Used by [`crate::with_retry`] to decide whether another attempt is worth
/// making.
///
/// | Class | Retried by default policy? | Retried when `retry_non_retryable = false`? |
/// |-------|---------------------------|---------------------------------------------|
/// | `Retryable` | Yes | Yes |
/// | `NonRetryable` | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure: network, timeout, rate limit, 5xx, unexpected body.
    Retryable,

    /// Permanent failure: bad credentials, bad configuration, 4xx.
    ///
    /// Retrying these burns the whole backoff budget without a chance of
    /// success.
    NonRetryable,
}
