//! Provider trait definitions.
//!
//! This module defines the capability set every metrics source implements.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::ProviderMetrics;

use super::capabilities::ProviderCapabilities;

/// Trait for external metrics sources.
///
/// Implement this trait to add support for a new data source. Shared
/// behavior (retry, pacing, timeouts) is composed inside the implementation
/// with [`crate::with_retry`], [`crate::RateLimiter`] and
/// [`crate::with_timeout`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use metricsdeck_providers::{FetchError, MetricsProvider, ProviderMetrics};
///
/// struct StripeProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MetricsProvider for StripeProvider {
///     fn id(&self) -> &'static str {
///         "stripe"
///     }
///
///     fn name(&self) -> &'static str {
///         "Stripe"
///     }
///
///     fn fetch_interval_minutes(&self) -> u32 {
///         60
///     }
///
///     async fn fetch(&self) -> Result<ProviderMetrics, FetchError> {
///         // ...
///     }
///
///     async fn validate_config(&self) -> bool {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Unique identifier for this provider (e.g. "attio").
    ///
    /// Used as the key in the registry, in persisted configs and in logs.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Default refresh interval.
    fn fetch_interval_minutes(&self) -> u32;

    /// Optional capabilities. Defaults to none.
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    /// Fetch the current snapshot.
    async fn fetch(&self) -> Result<ProviderMetrics, FetchError>;

    /// Fetch many historical periods in one call, one snapshot per period.
    ///
    /// Only called when [`ProviderCapabilities::supports_history`] is set.
    /// Default implementation returns `NotSupported`.
    async fn fetch_multiple(&self) -> Result<Vec<ProviderMetrics>, FetchError> {
        Err(FetchError::NotSupported {
            provider: self.id().to_string(),
            operation: "fetch_multiple".to_string(),
        })
    }

    /// Probe the vendor with a minimal authenticated request.
    ///
    /// Never fails: any error becomes `false`.
    async fn validate_config(&self) -> bool;
}

/// Pure mapping from a vendor's typed response into [`ProviderMetrics`].
///
/// Kept separate from [`MetricsProvider`] so the raw type can differ per
/// vendor while the provider trait stays object safe.
pub trait MetricsTransform {
    /// Typed vendor response.
    type Raw;

    /// Normalize a raw response.
    ///
    /// Malformed individual records are logged and skipped; they never fail
    /// the whole transform.
    fn transform(&self, raw: Self::Raw) -> ProviderMetrics;
}
