//! In-memory store and scripted providers shared by the metrics tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use metricsdeck_providers::{
    FetchError, MetricValue, MetricsProvider, ProviderCapabilities, ProviderMetrics,
};

use super::model::{
    FetchLog, FetchLogCompletion, FetchLogStatus, MetricsSnapshot, NewMetricsSnapshot,
    NewProviderConfig, ProviderConfig, ProviderFetchUpdate, ProviderStatus,
};
use super::store::{FetchLogStore, ProviderConfigStore, SnapshotStore};
use crate::errors::{DatabaseError, Result};

pub(crate) fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub(crate) fn config(provider_id: &str, interval: i32) -> ProviderConfig {
    let created = ts(2024, 1, 1, 0, 0);
    ProviderConfig {
        provider_id: provider_id.to_string(),
        name: provider_id.to_uppercase(),
        is_enabled: true,
        status: ProviderStatus::Inactive,
        fetch_interval_minutes: interval,
        last_fetch_at: None,
        next_fetch_at: None,
        config: None,
        created_at: created,
        updated_at: created,
    }
}

pub(crate) fn metrics_at(provider_id: &str, at: DateTime<Utc>, value: f64) -> ProviderMetrics {
    let mut data = ProviderMetrics::new(provider_id, at);
    data.insert("a", MetricValue::count(value, "A"));
    data
}

// =============================================================================
// Mock store
// =============================================================================

#[derive(Clone, Default)]
pub(crate) struct MockMetricsStore {
    pub configs: Arc<Mutex<Vec<ProviderConfig>>>,
    pub snapshots: Arc<Mutex<Vec<MetricsSnapshot>>>,
    pub logs: Arc<Mutex<Vec<FetchLog>>>,
    pub fail_on_save: Arc<Mutex<bool>>,
    next_id: Arc<AtomicUsize>,
}

impl MockMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: Vec<ProviderConfig>) -> Self {
        let store = Self::default();
        *store.configs.lock().unwrap() = configs;
        store
    }

    pub fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.lock().unwrap() = fail;
    }

    pub fn add_snapshot(&self, snapshot: NewMetricsSnapshot) {
        let row = self.to_row(snapshot);
        self.snapshots.lock().unwrap().push(row);
    }

    pub fn config_of(&self, provider_id: &str) -> Option<ProviderConfig> {
        self.configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.provider_id == provider_id)
            .cloned()
    }

    pub fn snapshots_of(&self, provider_id: &str) -> Vec<MetricsSnapshot> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.provider_id == provider_id)
            .cloned()
            .collect()
    }

    pub fn logs_of(&self, provider_id: &str) -> Vec<FetchLog> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.provider_id == provider_id)
            .cloned()
            .collect()
    }

    fn id(&self) -> String {
        format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn to_row(&self, snapshot: NewMetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            id: self.id(),
            provider_id: snapshot.provider_id,
            snapshot_date: snapshot.snapshot_date,
            snapshot_time: snapshot.snapshot_time,
            metrics: snapshot.metrics,
            raw_data: snapshot.raw_data,
            records_count: snapshot.records_count,
            created_at: snapshot.snapshot_time,
        }
    }
}

#[async_trait]
impl ProviderConfigStore for MockMetricsStore {
    fn get_provider_config(&self, provider_id: &str) -> Result<Option<ProviderConfig>> {
        Ok(self.config_of(provider_id))
    }

    fn list_provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        let mut configs = self.configs.lock().unwrap().clone();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    async fn insert_provider_config(&self, new: NewProviderConfig) -> Result<ProviderConfig> {
        let mut configs = self.configs.lock().unwrap();
        if configs.iter().any(|c| c.provider_id == new.provider_id) {
            return Err(DatabaseError::UniqueViolation(new.provider_id).into());
        }
        let now = Utc::now();
        let row = ProviderConfig {
            provider_id: new.provider_id,
            name: new.name,
            is_enabled: new.is_enabled,
            status: new.status,
            fetch_interval_minutes: new.fetch_interval_minutes,
            last_fetch_at: None,
            next_fetch_at: None,
            config: new.config,
            created_at: now,
            updated_at: now,
        };
        configs.push(row.clone());
        Ok(row)
    }

    async fn set_provider_enabled(&self, provider_id: &str, enabled: bool) -> Result<()> {
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .iter_mut()
            .find(|c| c.provider_id == provider_id)
            .ok_or_else(|| DatabaseError::NotFound(provider_id.to_string()))?;
        config.is_enabled = enabled;
        Ok(())
    }

    async fn record_successful_fetch(
        &self,
        provider_id: &str,
        update: ProviderFetchUpdate,
    ) -> Result<()> {
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .iter_mut()
            .find(|c| c.provider_id == provider_id)
            .ok_or_else(|| DatabaseError::NotFound(provider_id.to_string()))?;
        config.last_fetch_at = Some(update.last_fetch_at);
        config.next_fetch_at = Some(update.next_fetch_at);
        config.status = update.status;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for MockMetricsStore {
    async fn upsert_snapshot(&self, snapshot: NewMetricsSnapshot) -> Result<MetricsSnapshot> {
        if *self.fail_on_save.lock().unwrap() {
            return Err(DatabaseError::QueryFailed("disk full".to_string()).into());
        }
        let mut rows = self.snapshots.lock().unwrap();
        if let Some(existing) = rows.iter_mut().find(|s| {
            s.provider_id == snapshot.provider_id && s.snapshot_time == snapshot.snapshot_time
        }) {
            existing.metrics = snapshot.metrics;
            existing.raw_data = snapshot.raw_data;
            existing.records_count = snapshot.records_count;
            return Ok(existing.clone());
        }
        let row = self.to_row(snapshot);
        rows.push(row.clone());
        Ok(row)
    }

    fn latest_snapshot(&self, provider_id: &str) -> Result<Option<MetricsSnapshot>> {
        Ok(self.latest_snapshots(provider_id, 1)?.into_iter().next())
    }

    fn latest_snapshots(&self, provider_id: &str, limit: i64) -> Result<Vec<MetricsSnapshot>> {
        let mut rows = self.snapshots_of(provider_id);
        rows.sort_by(|a, b| b.snapshot_time.cmp(&a.snapshot_time));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    fn snapshots_since(&self, provider_id: &str, since: NaiveDate) -> Result<Vec<MetricsSnapshot>> {
        let mut rows: Vec<_> = self
            .snapshots_of(provider_id)
            .into_iter()
            .filter(|s| s.snapshot_date >= since)
            .collect();
        rows.sort_by(|a, b| a.snapshot_date.cmp(&b.snapshot_date));
        Ok(rows)
    }

    fn count_snapshots(&self) -> Result<i64> {
        Ok(self.snapshots.lock().unwrap().len() as i64)
    }
}

#[async_trait]
impl FetchLogStore for MockMetricsStore {
    async fn start_fetch_log(
        &self,
        provider_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<FetchLog> {
        let log = FetchLog {
            id: self.id(),
            provider_id: provider_id.to_string(),
            started_at,
            completed_at: None,
            status: FetchLogStatus::Success,
            duration_ms: None,
            records_fetched: None,
            error_message: None,
        };
        self.logs.lock().unwrap().push(log.clone());
        Ok(log)
    }

    async fn complete_fetch_log(&self, log_id: &str, completion: FetchLogCompletion) -> Result<()> {
        let mut logs = self.logs.lock().unwrap();
        let log = logs
            .iter_mut()
            .find(|l| l.id == log_id)
            .ok_or_else(|| DatabaseError::NotFound(log_id.to_string()))?;
        log.completed_at = Some(completion.completed_at);
        log.status = completion.status;
        log.duration_ms = Some(completion.duration_ms);
        log.records_fetched = completion.records_fetched;
        log.error_message = completion.error_message;
        Ok(())
    }

    fn recent_fetch_logs(&self, provider_id: &str, limit: i64) -> Result<Vec<FetchLog>> {
        let mut logs = self.logs_of(provider_id);
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }

    fn count_fetch_logs(&self) -> Result<i64> {
        Ok(self.logs.lock().unwrap().len() as i64)
    }

    fn last_fetch_started_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.logs.lock().unwrap().iter().map(|l| l.started_at).max())
    }
}

// =============================================================================
// Scripted provider
// =============================================================================

#[derive(Clone)]
pub(crate) enum Script {
    Single(ProviderMetrics),
    History(Vec<ProviderMetrics>),
    Fail(String),
    Hang,
}

pub(crate) struct ScriptedProvider {
    pub id: &'static str,
    pub script: Script,
    pub valid: bool,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: &'static str, script: Script) -> Self {
        Self {
            id,
            script,
            valid: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        self.id
    }

    fn fetch_interval_minutes(&self) -> u32 {
        60
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_history: matches!(self.script, Script::History(_)),
        }
    }

    async fn fetch(&self) -> std::result::Result<ProviderMetrics, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Single(data) => Ok(data.clone()),
            Script::History(rows) => rows.last().cloned().ok_or(FetchError::NoData {
                provider: self.id.to_string(),
            }),
            Script::Fail(message) => Err(FetchError::Network {
                provider: self.id.to_string(),
                message: message.clone(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::NoData {
                    provider: self.id.to_string(),
                })
            }
        }
    }

    async fn fetch_multiple(&self) -> std::result::Result<Vec<ProviderMetrics>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::History(rows) => Ok(rows.clone()),
            _ => Err(FetchError::NotSupported {
                provider: self.id.to_string(),
                operation: "fetch_multiple".to_string(),
            }),
        }
    }

    async fn validate_config(&self) -> bool {
        self.valid
    }
}
