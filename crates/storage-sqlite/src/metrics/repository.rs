use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::upsert::excluded;
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use metricsdeck_core::metrics::{
    FetchLog, FetchLogCompletion, FetchLogStatus, FetchLogStore, MetricsSnapshot,
    NewMetricsSnapshot, NewProviderConfig, ProviderConfig, ProviderConfigStore,
    ProviderFetchUpdate, SnapshotStore,
};
use metricsdeck_core::{DatabaseError, Result};

use super::model::{FetchLogDB, MetricsSnapshotDB, ProviderConfigDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::{fetch_logs, metrics_snapshots, provider_configs};
use crate::utils::{format_date, format_timestamp};

/// SQLite implementation of the metrics store traits.
pub struct MetricsRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MetricsRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        MetricsRepository { pool, writer }
    }
}

fn convert_all<D, T>(rows: Vec<D>) -> Result<Vec<T>>
where
    T: TryFrom<D, Error = StorageError>,
{
    rows.into_iter()
        .map(T::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()
        .into_core()
}

fn not_found_if_zero(affected: usize, what: String) -> Result<()> {
    if affected == 0 {
        return Err(DatabaseError::NotFound(what).into());
    }
    Ok(())
}

// =============================================================================
// Provider configs
// =============================================================================

#[async_trait]
impl ProviderConfigStore for MetricsRepository {
    fn get_provider_config(&self, provider_id: &str) -> Result<Option<ProviderConfig>> {
        let mut conn = get_connection(&self.pool)?;
        let row = provider_configs::table
            .find(provider_id)
            .select(ProviderConfigDB::as_select())
            .first::<ProviderConfigDB>(&mut conn)
            .optional()
            .into_core()?;
        row.map(ProviderConfig::try_from).transpose().into_core()
    }

    fn list_provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = provider_configs::table
            .order(provider_configs::name.asc())
            .select(ProviderConfigDB::as_select())
            .load::<ProviderConfigDB>(&mut conn)
            .into_core()?;
        convert_all(rows)
    }

    async fn insert_provider_config(&self, config: NewProviderConfig) -> Result<ProviderConfig> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<ProviderConfig> {
                let row = ProviderConfigDB::from_new(config, Utc::now()).into_core()?;
                let inserted = diesel::insert_into(provider_configs::table)
                    .values(&row)
                    .returning(ProviderConfigDB::as_returning())
                    .get_result(conn)
                    .into_core()?;
                ProviderConfig::try_from(inserted).into_core()
            })
            .await
    }

    async fn set_provider_enabled(&self, provider_id: &str, enabled: bool) -> Result<()> {
        let provider_id = provider_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let affected = diesel::update(provider_configs::table.find(&provider_id))
                    .set((
                        provider_configs::is_enabled.eq(enabled),
                        provider_configs::updated_at.eq(format_timestamp(Utc::now())),
                    ))
                    .execute(conn)
                    .into_core()?;
                not_found_if_zero(affected, format!("provider config {}", provider_id))
            })
            .await
    }

    async fn record_successful_fetch(
        &self,
        provider_id: &str,
        update: ProviderFetchUpdate,
    ) -> Result<()> {
        let provider_id = provider_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let affected = diesel::update(provider_configs::table.find(&provider_id))
                    .set((
                        provider_configs::last_fetch_at
                            .eq(Some(format_timestamp(update.last_fetch_at))),
                        provider_configs::next_fetch_at
                            .eq(Some(format_timestamp(update.next_fetch_at))),
                        provider_configs::status.eq(update.status.as_str()),
                        provider_configs::updated_at.eq(format_timestamp(Utc::now())),
                    ))
                    .execute(conn)
                    .into_core()?;
                not_found_if_zero(affected, format!("provider config {}", provider_id))
            })
            .await
    }
}

// =============================================================================
// Snapshots
// =============================================================================

#[async_trait]
impl SnapshotStore for MetricsRepository {
    async fn upsert_snapshot(&self, snapshot: NewMetricsSnapshot) -> Result<MetricsSnapshot> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<MetricsSnapshot> {
                let row = MetricsSnapshotDB::from_new(Uuid::new_v4().to_string(), snapshot, Utc::now())
                    .into_core()?;

                // Conflicting rows keep their id, date and created_at.
                let saved = diesel::insert_into(metrics_snapshots::table)
                    .values(&row)
                    .on_conflict((metrics_snapshots::provider_id, metrics_snapshots::snapshot_time))
                    .do_update()
                    .set((
                        metrics_snapshots::metrics.eq(excluded(metrics_snapshots::metrics)),
                        metrics_snapshots::raw_data.eq(excluded(metrics_snapshots::raw_data)),
                        metrics_snapshots::records_count
                            .eq(excluded(metrics_snapshots::records_count)),
                    ))
                    .returning(MetricsSnapshotDB::as_returning())
                    .get_result(conn)
                    .into_core()?;
                MetricsSnapshot::try_from(saved).into_core()
            })
            .await
    }

    fn latest_snapshot(&self, provider_id: &str) -> Result<Option<MetricsSnapshot>> {
        Ok(self.latest_snapshots(provider_id, 1)?.into_iter().next())
    }

    fn latest_snapshots(&self, provider_id: &str, limit: i64) -> Result<Vec<MetricsSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = metrics_snapshots::table
            .filter(metrics_snapshots::provider_id.eq(provider_id))
            .order(metrics_snapshots::snapshot_time.desc())
            .limit(limit)
            .select(MetricsSnapshotDB::as_select())
            .load::<MetricsSnapshotDB>(&mut conn)
            .into_core()?;
        convert_all(rows)
    }

    fn snapshots_since(&self, provider_id: &str, since: NaiveDate) -> Result<Vec<MetricsSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = metrics_snapshots::table
            .filter(metrics_snapshots::provider_id.eq(provider_id))
            .filter(metrics_snapshots::snapshot_date.ge(format_date(since)))
            .order((
                metrics_snapshots::snapshot_date.asc(),
                metrics_snapshots::snapshot_time.asc(),
            ))
            .select(MetricsSnapshotDB::as_select())
            .load::<MetricsSnapshotDB>(&mut conn)
            .into_core()?;
        convert_all(rows)
    }

    fn count_snapshots(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        metrics_snapshots::table
            .count()
            .get_result(&mut conn)
            .into_core()
    }
}

// =============================================================================
// Fetch logs
// =============================================================================

#[async_trait]
impl FetchLogStore for MetricsRepository {
    async fn start_fetch_log(
        &self,
        provider_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<FetchLog> {
        let row = FetchLogDB {
            id: Uuid::new_v4().to_string(),
            provider_id: provider_id.to_string(),
            started_at: format_timestamp(started_at),
            completed_at: None,
            status: FetchLogStatus::Success.as_str().to_string(),
            duration_ms: None,
            records_fetched: None,
            error_message: None,
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<FetchLog> {
                let inserted = diesel::insert_into(fetch_logs::table)
                    .values(&row)
                    .returning(FetchLogDB::as_returning())
                    .get_result(conn)
                    .into_core()?;
                FetchLog::try_from(inserted).into_core()
            })
            .await
    }

    async fn complete_fetch_log(&self, log_id: &str, completion: FetchLogCompletion) -> Result<()> {
        let log_id = log_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let affected = diesel::update(fetch_logs::table.find(&log_id))
                    .set((
                        fetch_logs::completed_at.eq(Some(format_timestamp(completion.completed_at))),
                        fetch_logs::status.eq(completion.status.as_str()),
                        fetch_logs::duration_ms.eq(Some(completion.duration_ms)),
                        fetch_logs::records_fetched.eq(completion.records_fetched),
                        fetch_logs::error_message.eq(completion.error_message),
                    ))
                    .execute(conn)
                    .into_core()?;
                not_found_if_zero(affected, format!("fetch log {}", log_id))
            })
            .await
    }

    fn recent_fetch_logs(&self, provider_id: &str, limit: i64) -> Result<Vec<FetchLog>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = fetch_logs::table
            .filter(fetch_logs::provider_id.eq(provider_id))
            .order(fetch_logs::started_at.desc())
            .limit(limit)
            .select(FetchLogDB::as_select())
            .load::<FetchLogDB>(&mut conn)
            .into_core()?;
        convert_all(rows)
    }

    fn count_fetch_logs(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        fetch_logs::table.count().get_result(&mut conn).into_core()
    }

    fn last_fetch_started_at(&self) -> Result<Option<DateTime<Utc>>> {
        let mut conn = get_connection(&self.pool)?;
        let latest = fetch_logs::table
            .select(diesel::dsl::max(fetch_logs::started_at))
            .first::<Option<String>>(&mut conn)
            .into_core()?;
        crate::utils::parse_optional_timestamp(latest.as_deref()).into_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::TimeZone;
    use metricsdeck_core::metrics::{
        FetchOrchestrator, MetricsQueries, MetricsStore, ProviderStatus,
    };
    use metricsdeck_providers::{
        FetchError, MetricType, MetricValue, MetricsProvider, ProviderMetrics,
    };
    use tempfile::tempdir;

    async fn create_test_repository() -> (MetricsRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (MetricsRepository::new(Arc::clone(&pool), writer), temp_dir)
    }

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn new_config(provider_id: &str, name: &str) -> NewProviderConfig {
        NewProviderConfig {
            provider_id: provider_id.to_string(),
            name: name.to_string(),
            is_enabled: true,
            status: ProviderStatus::Inactive,
            fetch_interval_minutes: 60,
            config: Some(serde_json::json!({ "description": "test" })),
        }
    }

    fn snapshot(provider_id: &str, at: DateTime<Utc>, value: f64) -> NewMetricsSnapshot {
        let mut data = ProviderMetrics::new(provider_id, at);
        data.insert("a", MetricValue::count(value, "A"));
        NewMetricsSnapshot::from(&data)
    }

    #[tokio::test]
    async fn test_provider_config_lifecycle() {
        let (repo, _temp_dir) = create_test_repository().await;

        repo.insert_provider_config(new_config("notion", "Notion"))
            .await
            .unwrap();
        repo.insert_provider_config(new_config("attio", "Attio CRM"))
            .await
            .unwrap();

        let names: Vec<_> = repo
            .list_provider_configs()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Attio CRM", "Notion"]);

        let duplicate = repo.insert_provider_config(new_config("notion", "Notion")).await;
        assert!(duplicate.is_err());

        repo.set_provider_enabled("notion", false).await.unwrap();
        let update = ProviderFetchUpdate {
            last_fetch_at: ts(1, 10),
            next_fetch_at: ts(1, 11),
            status: ProviderStatus::Active,
        };
        repo.record_successful_fetch("notion", update).await.unwrap();

        let config = repo.get_provider_config("notion").unwrap().unwrap();
        assert!(!config.is_enabled);
        assert_eq!(config.last_fetch_at, Some(ts(1, 10)));
        assert_eq!(config.next_fetch_at, Some(ts(1, 11)));
        assert_eq!(config.status, ProviderStatus::Active);
        assert_eq!(config.config.unwrap()["description"], "test");

        assert!(repo.get_provider_config("missing").unwrap().is_none());
        assert!(repo.set_provider_enabled("missing", true).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_snapshot_is_keyed_by_provider_and_time() {
        let (repo, _temp_dir) = create_test_repository().await;

        let first = repo.upsert_snapshot(snapshot("p", ts(1, 12), 5.0)).await.unwrap();
        let second = repo.upsert_snapshot(snapshot("p", ts(1, 12), 7.0)).await.unwrap();
        repo.upsert_snapshot(snapshot("q", ts(1, 12), 1.0)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.count_snapshots().unwrap(), 2);

        let latest = repo.latest_snapshot("p").unwrap().unwrap();
        assert_eq!(latest.metrics["a"].value.as_f64(), Some(7.0));
        assert_eq!(latest.metrics["a"].metric_type, MetricType::Count);
        assert_eq!(latest.snapshot_time, ts(1, 12));
        assert_eq!(latest.snapshot_date.to_string(), "2024-03-01");
    }

    #[tokio::test]
    async fn test_snapshot_ordering_queries() {
        let (repo, _temp_dir) = create_test_repository().await;
        for (day, value) in [(3, 3.0), (1, 1.0), (9, 9.0), (5, 5.0)] {
            repo.upsert_snapshot(snapshot("p", ts(day, 0), value)).await.unwrap();
        }

        let latest: Vec<_> = repo
            .latest_snapshots("p", 2)
            .unwrap()
            .into_iter()
            .map(|s| s.snapshot_time)
            .collect();
        assert_eq!(latest, vec![ts(9, 0), ts(5, 0)]);

        let since: Vec<_> = repo
            .snapshots_since("p", NaiveDate::from_ymd_opt(2024, 3, 3).unwrap())
            .unwrap()
            .into_iter()
            .map(|s| s.snapshot_time)
            .collect();
        assert_eq!(since, vec![ts(3, 0), ts(5, 0), ts(9, 0)]);
    }

    #[tokio::test]
    async fn test_fetch_log_lifecycle() {
        let (repo, _temp_dir) = create_test_repository().await;
        assert!(repo.last_fetch_started_at().unwrap().is_none());

        let first = repo.start_fetch_log("p", ts(1, 8)).await.unwrap();
        let second = repo.start_fetch_log("p", ts(1, 9)).await.unwrap();
        assert_eq!(first.status, FetchLogStatus::Success);
        assert!(first.completed_at.is_none());

        repo.complete_fetch_log(&first.id, FetchLogCompletion::success(ts(1, 8), 120, 4))
            .await
            .unwrap();
        repo.complete_fetch_log(&second.id, FetchLogCompletion::failure(ts(1, 9), 80, "boom"))
            .await
            .unwrap();

        let logs = repo.recent_fetch_logs("p", 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, second.id);
        assert_eq!(logs[0].status, FetchLogStatus::Failure);
        assert_eq!(logs[0].error_message.as_deref(), Some("boom"));
        assert_eq!(logs[1].records_fetched, Some(4));
        assert_eq!(logs[1].duration_ms, Some(120));

        assert_eq!(repo.count_fetch_logs().unwrap(), 2);
        assert_eq!(repo.last_fetch_started_at().unwrap(), Some(ts(1, 9)));
        assert!(repo
            .complete_fetch_log("missing", FetchLogCompletion::success(ts(1, 9), 1, 1))
            .await
            .is_err());
    }

    struct FixedProvider {
        at: DateTime<Utc>,
    }

    #[async_trait]
    impl MetricsProvider for FixedProvider {
        fn id(&self) -> &'static str {
            "fixed"
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }

        fn fetch_interval_minutes(&self) -> u32 {
            60
        }

        async fn fetch(&self) -> std::result::Result<ProviderMetrics, FetchError> {
            let mut data = ProviderMetrics::new("fixed", self.at);
            data.insert("a", MetricValue::count(5.0, "A"));
            Ok(data)
        }

        async fn validate_config(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_orchestrator_round_trip_through_sqlite() {
        let (repo, _temp_dir) = create_test_repository().await;
        let store: Arc<dyn MetricsStore> = Arc::new(repo);
        store
            .insert_provider_config(new_config("fixed", "Fixed"))
            .await
            .unwrap();

        let orchestrator = FetchOrchestrator::new(Arc::clone(&store));
        let provider: Arc<dyn MetricsProvider> = Arc::new(FixedProvider { at: ts(1, 12) });
        orchestrator.fetch_provider(&provider).await.unwrap();
        orchestrator.fetch_provider(&provider).await.unwrap();

        assert_eq!(store.count_snapshots().unwrap(), 1);
        assert_eq!(store.count_fetch_logs().unwrap(), 2);

        let dashboard = MetricsQueries::new(Arc::clone(&store))
            .latest_metrics(Utc::now())
            .unwrap();
        let metric = &dashboard.providers[0].metrics["a"];
        assert_eq!(metric.value.as_f64(), Some(5.0));
        assert_eq!(metric.metric_type, MetricType::Count);
        assert!(!dashboard.providers[0].is_stale);
    }
}
