//! Persisted metrics domain models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use metricsdeck_providers::{MetricValue, ProviderMetrics};

use crate::errors::Error;

// =============================================================================
// Provider configuration
// =============================================================================

/// Operational status of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Active,
    Inactive,
    Maintenance,
    Error,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Maintenance => "MAINTENANCE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "MAINTENANCE" => Ok(Self::Maintenance),
            "ERROR" => Ok(Self::Error),
            other => Err(Error::Unexpected(format!(
                "Unknown provider status '{}'",
                other
            ))),
        }
    }
}

/// Persisted configuration and schedule for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider_id: String,
    pub name: String,
    pub is_enabled: bool,
    pub status: ProviderStatus,
    pub fetch_interval_minutes: i32,
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// Always `last_fetch_at + fetch_interval_minutes` when set.
    pub next_fetch_at: Option<DateTime<Utc>>,
    pub config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input model for creating a provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProviderConfig {
    pub provider_id: String,
    pub name: String,
    pub is_enabled: bool,
    pub status: ProviderStatus,
    pub fetch_interval_minutes: i32,
    pub config: Option<Value>,
}

/// Schedule update written after a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFetchUpdate {
    pub last_fetch_at: DateTime<Utc>,
    pub next_fetch_at: DateTime<Utc>,
    pub status: ProviderStatus,
}

// =============================================================================
// Snapshots
// =============================================================================

/// A persisted metrics snapshot.
///
/// `(provider_id, snapshot_time)` is unique: saving the same pair again
/// replaces the row's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub id: String,
    pub provider_id: String,
    pub snapshot_date: NaiveDate,
    pub snapshot_time: DateTime<Utc>,
    pub metrics: BTreeMap<String, MetricValue>,
    pub raw_data: Option<Value>,
    pub records_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Input model for saving a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMetricsSnapshot {
    pub provider_id: String,
    pub snapshot_date: NaiveDate,
    pub snapshot_time: DateTime<Utc>,
    pub metrics: BTreeMap<String, MetricValue>,
    pub raw_data: Option<Value>,
    pub records_count: i32,
}

impl From<&ProviderMetrics> for NewMetricsSnapshot {
    fn from(data: &ProviderMetrics) -> Self {
        Self {
            provider_id: data.provider_id.clone(),
            snapshot_date: data.timestamp.date_naive(),
            snapshot_time: data.timestamp,
            metrics: data.metrics.clone(),
            raw_data: data.metadata.clone(),
            records_count: data.metric_count() as i32,
        }
    }
}

// =============================================================================
// Fetch logs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchLogStatus {
    Success,
    Failure,
}

impl FetchLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for FetchLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchLogStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            other => Err(Error::Unexpected(format!(
                "Unknown fetch log status '{}'",
                other
            ))),
        }
    }
}

/// Audit record for one fetch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchLog {
    pub id: String,
    pub provider_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Provisionally `Success` until the attempt completes.
    pub status: FetchLogStatus,
    pub duration_ms: Option<i64>,
    pub records_fetched: Option<i32>,
    pub error_message: Option<String>,
}

/// Final outcome written to a fetch log when its attempt ends.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchLogCompletion {
    pub completed_at: DateTime<Utc>,
    pub status: FetchLogStatus,
    pub duration_ms: i64,
    pub records_fetched: Option<i32>,
    pub error_message: Option<String>,
}

impl FetchLogCompletion {
    pub fn success(completed_at: DateTime<Utc>, duration_ms: i64, records_fetched: i32) -> Self {
        Self {
            completed_at,
            status: FetchLogStatus::Success,
            duration_ms,
            records_fetched: Some(records_fetched),
            error_message: None,
        }
    }

    pub fn failure(completed_at: DateTime<Utc>, duration_ms: i64, error: impl Into<String>) -> Self {
        Self {
            completed_at,
            status: FetchLogStatus::Failure,
            duration_ms,
            records_fetched: None,
            error_message: Some(error.into()),
        }
    }
}

// =============================================================================
// Orchestration results
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Failure,
    Partial,
}

/// Outcome of fetching one provider in an orchestration pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub provider_id: String,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProviderMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResult {
    pub fn success(provider_id: impl Into<String>, data: ProviderMetrics) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: FetchStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(provider_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: FetchStatus::Failure,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}
