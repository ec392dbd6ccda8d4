//! Error types and retry classification for the providers crate.
//!
//! This module provides:
//! - [`FetchError`]: The main error enum for all provider operations
//! - [`RegistryError`]: Errors raised by the provider registry
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching from an external metrics source.
///
/// Every variant carries the id of the provider that produced it so the
/// message stays meaningful once it reaches the orchestrator's fetch log.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("[{provider}] Network error: {message}")]
    Network { provider: String, message: String },

    /// The operation did not complete within the allotted time.
    #[error("[{provider}] Operation timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    /// The vendor rate limited the request (HTTP 429).
    #[error("[{provider}] Rate limited by vendor")]
    RateLimited { provider: String },

    /// The vendor rejected our credentials (HTTP 401/403).
    #[error("[{provider}] Authentication failed: {message}")]
    Auth { provider: String, message: String },

    /// The vendor returned a non-success status.
    #[error("[{provider}] API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("[{provider}] Failed to parse response: {message}")]
    Parse { provider: String, message: String },

    /// A single raw record could not be interpreted.
    ///
    /// Raised inside transforms and swallowed there; it never fails a batch.
    #[error("[{provider}] Malformed record {record}: {reason}")]
    MalformedRecord {
        provider: String,
        record: String,
        reason: String,
    },

    /// The provider returned no snapshots at all.
    #[error("[{provider}] No data returned from provider")]
    NoData { provider: String },

    /// The provider does not implement the requested capability.
    #[error("[{provider}] Operation not supported: {operation}")]
    NotSupported { provider: String, operation: String },

    /// Provider configuration is missing or invalid.
    #[error("[{provider}] Invalid configuration: {message}")]
    Config { provider: String, message: String },

    /// The provider's rate limiter was shut down while waiting for a slot.
    #[error("[{provider}] Rate limiter closed")]
    LimiterClosed { provider: String },

    /// All retry attempts were used up.
    #[error("[{provider}] Max retries exceeded: {source}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Returns the retry classification for this error.
    ///
    /// Credential and configuration problems will not fix themselves, so
    /// they are [`RetryClass::NonRetryable`]. Whether the retry decorator
    /// honours that is decided by [`crate::RetryPolicy`].
    ///
    /// # Examples
    ///
    /// ```
    /// use metricsdeck_providers::{FetchError, RetryClass};
    ///
    /// let error = FetchError::RateLimited { provider: "attio".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Retryable);
    ///
    /// let error = FetchError::Auth {
    ///     provider: "notion".to_string(),
    ///     message: "invalid token".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::NonRetryable);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::Parse { .. }
            | Self::NoData { .. } => RetryClass::Retryable,

            Self::Api { status, .. } => {
                if *status >= 500 {
                    RetryClass::Retryable
                } else {
                    RetryClass::NonRetryable
                }
            }

            Self::Auth { .. }
            | Self::Config { .. }
            | Self::NotSupported { .. }
            | Self::MalformedRecord { .. }
            | Self::LimiterClosed { .. }
            | Self::RetriesExhausted { .. } => RetryClass::NonRetryable,
        }
    }

    /// The id of the provider that produced this error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Network { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::RateLimited { provider }
            | Self::Auth { provider, .. }
            | Self::Api { provider, .. }
            | Self::Parse { provider, .. }
            | Self::MalformedRecord { provider, .. }
            | Self::NoData { provider }
            | Self::NotSupported { provider, .. }
            | Self::Config { provider, .. }
            | Self::LimiterClosed { provider }
            | Self::RetriesExhausted { provider, .. } => provider,
        }
    }

    /// Builds an error from a failed `reqwest` call.
    pub fn from_reqwest(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout {
                provider: provider.to_string(),
                after_ms: 0,
            };
        }
        if error.is_decode() {
            return Self::Parse {
                provider: provider.to_string(),
                message: error.to_string(),
            };
        }
        Self::Network {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    }

    /// Maps a non-success HTTP status and body into the matching variant.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Auth {
                provider: provider.to_string(),
                message: body,
            },
            429 => Self::RateLimited {
                provider: provider.to_string(),
            },
            code => Self::Api {
                provider: provider.to_string(),
                status: code,
                message: body,
            },
        }
    }
}

/// Errors raised by [`crate::ProviderRegistry`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A provider with this id is already registered.
    #[error("Provider with ID \"{0}\" is already registered")]
    DuplicateProvider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        let error = FetchError::Network {
            provider: "attio".to_string(),
            message: "connection reset".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retryable);

        let error = FetchError::Timeout {
            provider: "ga4".to_string(),
            after_ms: 30_000,
        };
        assert_eq!(error.retry_class(), RetryClass::Retryable);
    }

    #[test]
    fn test_server_errors_retry_client_errors_do_not() {
        let error = FetchError::Api {
            provider: "notion".to_string(),
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Retryable);

        let error = FetchError::Api {
            provider: "notion".to_string(),
            status: 400,
            message: "validation_error".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NonRetryable);
    }

    #[test]
    fn test_auth_is_not_retryable() {
        let error = FetchError::from_status(
            "attio",
            reqwest::StatusCode::UNAUTHORIZED,
            "invalid api key".to_string(),
        );
        assert!(matches!(error, FetchError::Auth { .. }));
        assert_eq!(error.retry_class(), RetryClass::NonRetryable);
    }

    #[test]
    fn test_too_many_requests_maps_to_rate_limited() {
        let error = FetchError::from_status(
            "ga4",
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            String::new(),
        );
        assert!(matches!(error, FetchError::RateLimited { .. }));
    }

    #[test]
    fn test_error_display_includes_provider() {
        let error = FetchError::RetriesExhausted {
            provider: "attio".to_string(),
            attempts: 4,
            source: Box::new(FetchError::Api {
                provider: "attio".to_string(),
                status: 500,
                message: "oops".to_string(),
            }),
        };
        assert_eq!(
            error.to_string(),
            "[attio] Max retries exceeded: [attio] API error (500): oops"
        );
        assert_eq!(error.provider(), "attio");
    }

    #[test]
    fn test_duplicate_provider_display() {
        let error = RegistryError::DuplicateProvider("x".to_string());
        assert_eq!(error.to_string(), "Provider with ID \"x\" is already registered");
    }
}
