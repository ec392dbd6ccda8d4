//! SQLite storage implementation for MetricsDeck.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store traits defined in `metricsdeck-core` and contains:
//! - Database connection pooling and the single-writer actor
//! - Diesel migrations
//! - The metrics repository (provider configs, snapshots, fetch logs)
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//!
//! ```text
//! core (orchestrator, queries)     providers (vendor fetchers)
//!       │                                │
//!       └───────────────┬────────────────┘
//!                       │
//!                       ▼
//!           storage-sqlite (this crate)
//!                       │
//!                       ▼
//!                   SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod metrics;
pub mod schema;
pub mod utils;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use metrics::MetricsRepository;

// Re-export from metricsdeck-core for convenience
pub use metricsdeck_core::errors::{DatabaseError, Error, Result};
