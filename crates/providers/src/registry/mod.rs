//! Provider registry module.
//!
//! This module provides:
//! - Provider registration by unique id, in registration order
//! - Rate limiting per external service

mod provider_registry;
mod rate_limiter;

pub use provider_registry::ProviderRegistry;
pub use rate_limiter::RateLimiter;
