//! Database models for provider configs, snapshots and fetch logs.

use diesel::prelude::*;

use metricsdeck_core::metrics::{
    FetchLog, MetricsSnapshot, NewMetricsSnapshot, NewProviderConfig, ProviderConfig,
};

use crate::errors::StorageError;
use crate::utils::{
    format_date, format_timestamp, parse_date, parse_optional_timestamp, parse_timestamp,
};

// =============================================================================
// provider_configs
// =============================================================================

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::provider_configs)]
#[diesel(primary_key(provider_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderConfigDB {
    pub provider_id: String,
    pub name: String,
    pub is_enabled: bool,
    pub status: String,
    pub fetch_interval_minutes: i32,
    pub last_fetch_at: Option<String>,
    pub next_fetch_at: Option<String>,
    pub config: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ProviderConfigDB> for ProviderConfig {
    type Error = StorageError;

    fn try_from(db: ProviderConfigDB) -> Result<Self, Self::Error> {
        Ok(Self {
            status: db
                .status
                .parse()
                .map_err(|e: metricsdeck_core::Error| StorageError::SerializationError(e.to_string()))?,
            last_fetch_at: parse_optional_timestamp(db.last_fetch_at.as_deref())?,
            next_fetch_at: parse_optional_timestamp(db.next_fetch_at.as_deref())?,
            config: db.config.as_deref().map(serde_json::from_str).transpose()?,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            provider_id: db.provider_id,
            name: db.name,
            is_enabled: db.is_enabled,
            fetch_interval_minutes: db.fetch_interval_minutes,
        })
    }
}

impl ProviderConfigDB {
    pub fn from_new(
        domain: NewProviderConfig,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Self, StorageError> {
        let now = format_timestamp(now);
        Ok(Self {
            provider_id: domain.provider_id,
            name: domain.name,
            is_enabled: domain.is_enabled,
            status: domain.status.as_str().to_string(),
            fetch_interval_minutes: domain.fetch_interval_minutes,
            last_fetch_at: None,
            next_fetch_at: None,
            config: domain.config.as_ref().map(serde_json::to_string).transpose()?,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

// =============================================================================
// metrics_snapshots
// =============================================================================

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::metrics_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetricsSnapshotDB {
    pub id: String,
    pub provider_id: String,
    pub snapshot_date: String,
    pub snapshot_time: String,
    pub metrics: String,
    pub raw_data: Option<String>,
    pub records_count: i32,
    pub created_at: String,
}

impl TryFrom<MetricsSnapshotDB> for MetricsSnapshot {
    type Error = StorageError;

    fn try_from(db: MetricsSnapshotDB) -> Result<Self, Self::Error> {
        Ok(Self {
            snapshot_date: parse_date(&db.snapshot_date)?,
            snapshot_time: parse_timestamp(&db.snapshot_time)?,
            metrics: serde_json::from_str(&db.metrics)?,
            raw_data: db.raw_data.as_deref().map(serde_json::from_str).transpose()?,
            created_at: parse_timestamp(&db.created_at)?,
            id: db.id,
            provider_id: db.provider_id,
            records_count: db.records_count,
        })
    }
}

impl MetricsSnapshotDB {
    pub fn from_new(
        id: String,
        domain: NewMetricsSnapshot,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            id,
            provider_id: domain.provider_id,
            snapshot_date: format_date(domain.snapshot_date),
            snapshot_time: format_timestamp(domain.snapshot_time),
            metrics: serde_json::to_string(&domain.metrics)?,
            raw_data: domain.raw_data.as_ref().map(serde_json::to_string).transpose()?,
            records_count: domain.records_count,
            created_at: format_timestamp(now),
        })
    }
}

// =============================================================================
// fetch_logs
// =============================================================================

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::fetch_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FetchLogDB {
    pub id: String,
    pub provider_id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub records_fetched: Option<i32>,
    pub error_message: Option<String>,
}

impl TryFrom<FetchLogDB> for FetchLog {
    type Error = StorageError;

    fn try_from(db: FetchLogDB) -> Result<Self, Self::Error> {
        Ok(Self {
            started_at: parse_timestamp(&db.started_at)?,
            completed_at: parse_optional_timestamp(db.completed_at.as_deref())?,
            status: db
                .status
                .parse()
                .map_err(|e: metricsdeck_core::Error| StorageError::SerializationError(e.to_string()))?,
            id: db.id,
            provider_id: db.provider_id,
            duration_ms: db.duration_ms,
            records_fetched: db.records_fetched,
            error_message: db.error_message,
        })
    }
}
