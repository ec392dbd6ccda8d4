//! Metrics provider abstractions and implementations.
//!
//! This module contains:
//! - The `MetricsProvider` trait that all providers implement
//! - The `MetricsTransform` trait for typed response normalization
//! - Provider capabilities and rate limiting configuration
//! - Concrete provider implementations (Attio, GA4, Notion)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The orchestrator doesn't know about specific vendors
//! - **Extensible**: New sources can be added by implementing `MetricsProvider`
//! - **Resilient**: Retry and pacing are composed around each vendor call

mod capabilities;
mod http;
mod traits;

pub mod attio;
pub mod ga4;
pub mod notion;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use traits::{MetricsProvider, MetricsTransform};
