//! MetricsDeck Core - fetch orchestration, persistence contracts and queries.
//!
//! This crate contains the business logic that sits between the vendor
//! providers (`metricsdeck-providers`) and durable storage. It is
//! database-agnostic and defines store traits that are implemented by the
//! `storage-sqlite` crate.

pub mod errors;
pub mod metrics;

// Re-export error types
pub use errors::{DatabaseError, Error, Result};

// Re-export the metrics surface
pub use metrics::*;
