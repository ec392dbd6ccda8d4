//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a metrics provider
//! can do and how its outbound calls should be paced.

use std::time::Duration;

/// Describes the optional capabilities of a provider.
#[derive(Clone, Debug, Default)]
pub struct ProviderCapabilities {
    /// Whether the provider can return many historical periods in one call
    /// through `fetch_multiple`.
    pub supports_history: bool,
}

/// Pacing configuration for one external service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum operations in flight at once.
    pub max_concurrency: usize,

    /// Minimum spacing between the starts of consecutive operations.
    pub min_delay: Duration,
}

impl RateLimit {
    pub const fn new(max_concurrency: usize, min_delay_ms: u64) -> Self {
        Self {
            max_concurrency,
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// Fixed limits for the services we talk to.
    ///
    /// Unknown services get the conservative default.
    pub fn for_service(service_id: &str) -> Self {
        match service_id {
            // ~3 requests per second
            "notion" => Self::new(3, 334),
            "attio" => Self::new(50, 20),
            "ga4" => Self::new(10, 100),
            "phantombuster" => Self::new(5, 200),
            _ => Self::default(),
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(5, 200)
    }
}
