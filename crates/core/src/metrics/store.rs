//! Metrics storage traits.
//!
//! These traits abstract the persistence layer for provider configurations,
//! snapshots and fetch logs so the orchestrator can run against SQLite in
//! production and in-memory mocks in tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::model::{
    FetchLog, FetchLogCompletion, MetricsSnapshot, NewMetricsSnapshot, NewProviderConfig,
    ProviderConfig, ProviderFetchUpdate,
};
use crate::errors::Result;

// =============================================================================
// Provider Config Store
// =============================================================================

/// Storage interface for provider configuration and schedule rows.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    /// Returns the configuration for a provider, if one exists.
    fn get_provider_config(&self, provider_id: &str) -> Result<Option<ProviderConfig>>;

    /// All configurations ordered by name.
    fn list_provider_configs(&self) -> Result<Vec<ProviderConfig>>;

    async fn insert_provider_config(&self, config: NewProviderConfig) -> Result<ProviderConfig>;

    async fn set_provider_enabled(&self, provider_id: &str, enabled: bool) -> Result<()>;

    /// Advances the schedule after a successful fetch.
    ///
    /// Returns `DatabaseError::NotFound` when no configuration row exists.
    async fn record_successful_fetch(
        &self,
        provider_id: &str,
        update: ProviderFetchUpdate,
    ) -> Result<()>;
}

// =============================================================================
// Snapshot Store
// =============================================================================

/// Storage interface for metrics snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts a snapshot, or replaces the payload of the existing row with the
    /// same `(provider_id, snapshot_time)`.
    async fn upsert_snapshot(&self, snapshot: NewMetricsSnapshot) -> Result<MetricsSnapshot>;

    fn latest_snapshot(&self, provider_id: &str) -> Result<Option<MetricsSnapshot>>;

    /// Most recent snapshots first.
    fn latest_snapshots(&self, provider_id: &str, limit: i64) -> Result<Vec<MetricsSnapshot>>;

    /// Snapshots dated on or after `since`, oldest first.
    fn snapshots_since(&self, provider_id: &str, since: NaiveDate) -> Result<Vec<MetricsSnapshot>>;

    fn count_snapshots(&self) -> Result<i64>;
}

// =============================================================================
// Fetch Log Store
// =============================================================================

/// Storage interface for fetch audit logs.
#[async_trait]
pub trait FetchLogStore: Send + Sync {
    /// Opens a log row for an attempt that has just started.
    async fn start_fetch_log(&self, provider_id: &str, started_at: DateTime<Utc>)
        -> Result<FetchLog>;

    async fn complete_fetch_log(&self, log_id: &str, completion: FetchLogCompletion)
        -> Result<()>;

    /// Most recent logs first.
    fn recent_fetch_logs(&self, provider_id: &str, limit: i64) -> Result<Vec<FetchLog>>;

    fn count_fetch_logs(&self) -> Result<i64>;

    /// Start time of the most recent attempt across all providers.
    fn last_fetch_started_at(&self) -> Result<Option<DateTime<Utc>>>;
}

/// Everything the orchestrator and query layer need from storage.
pub trait MetricsStore: ProviderConfigStore + SnapshotStore + FetchLogStore {}

impl<T> MetricsStore for T where T: ProviderConfigStore + SnapshotStore + FetchLogStore {}
