//! MetricsDeck Providers Crate
//!
//! This crate provides vendor-agnostic metrics fetching for MetricsDeck.
//!
//! # Overview
//!
//! The providers crate supports:
//! - A uniform [`MetricsProvider`] capability set for external sources
//! - Vendor integrations: Attio (CRM), Google Analytics 4, Notion
//! - Per-service rate limiting with FIFO admission
//! - Exponential-backoff retry and timeout decorators
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   Orchestrator   |  (core crate: persistence, fetch logs)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | ProviderRegistry |  (id -> provider, registration order)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |    Provider      | --> |   with_retry     |  (1s, 2s, 4s backoff)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   RateLimiter    |  (per service)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          | ProviderMetrics  |  (normalized snapshot)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`ProviderMetrics`] - Normalized snapshot produced by a fetch
//! - [`MetricValue`] - A single typed measurement with optional change
//! - [`FetchError`] - Error enum shared by every provider operation
//! - [`RetryPolicy`] - Backoff configuration for [`with_retry`]

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod resilience;

// Re-export error types
pub use errors::{FetchError, RegistryError, RetryClass};

// Re-export all public types from models
pub use models::{
    percent_change, ChangeDirection, MetricData, MetricType, MetricValue, ProviderId,
    ProviderMetrics, NEUTRAL_CHANGE_THRESHOLD,
};

// Re-export provider types
pub use provider::attio::{AttioConfig, AttioProvider};
pub use provider::ga4::{Ga4Config, Ga4Provider};
pub use provider::notion::{NotionConfig, NotionProvider};
pub use provider::{MetricsProvider, MetricsTransform, ProviderCapabilities, RateLimit};

// Re-export registry types
pub use registry::{ProviderRegistry, RateLimiter};

// Re-export resilience decorators
pub use resilience::{with_retry, with_timeout, RetryPolicy};
