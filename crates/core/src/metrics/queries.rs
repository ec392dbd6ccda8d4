//! Read-side queries for dashboards: latest values, staleness, history and
//! period-over-period trends.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use metricsdeck_providers::{percent_change, ChangeDirection, MetricData, MetricValue};

use super::model::{FetchLog, MetricsSnapshot, ProviderConfig};
use super::orchestrator::minutes_between;
use super::store::MetricsStore;
use crate::errors::Result;

/// Default look-back for [`MetricsQueries::provider_history`].
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Default page size for [`MetricsQueries::provider_fetch_logs`].
pub const DEFAULT_LOG_LIMIT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub providers: Vec<ProviderDashboardData>,
    pub last_updated: DateTime<Utc>,
    pub staleness: StalenessInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDashboardData {
    pub provider_id: String,
    pub name: String,
    pub metrics: BTreeMap<String, MetricValue>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub fetch_interval_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessInfo {
    pub has_stale_data: bool,
    pub stale_providers: Vec<String>,
    /// Age of the oldest data shown, rounded to whole minutes.
    pub oldest_data_age_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStaleness {
    pub is_stale: bool,
    /// `None` when the provider has never been fetched.
    pub minutes_old: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl From<ChangeDirection> for Trend {
    fn from(direction: ChangeDirection) -> Self {
        match direction {
            ChangeDirection::Up => Trend::Improving,
            ChangeDirection::Down => Trend::Declining,
            ChangeDirection::Neutral => Trend::Stable,
        }
    }
}

/// Change of one metric between the two most recent snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    pub metric_key: String,
    pub label: String,
    pub current_value: MetricData,
    pub previous_value: Option<MetricData>,
    /// Percentage change. Only set when both values are numeric.
    pub change: Option<f64>,
    pub change_direction: ChangeDirection,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_snapshots: i64,
    pub total_logs: i64,
    pub active_providers: i64,
    pub last_fetch: Option<DateTime<Utc>>,
}

pub struct MetricsQueries {
    store: Arc<dyn MetricsStore>,
}

impl MetricsQueries {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Latest metrics for every enabled provider, with staleness.
    ///
    /// Providers that have no snapshot yet are listed with no metrics and
    /// counted as stale.
    pub fn latest_metrics(&self, now: DateTime<Utc>) -> Result<DashboardMetrics> {
        let mut providers = Vec::new();
        let mut stale_providers = Vec::new();
        let mut oldest_age: f64 = 0.0;

        for config in self
            .store
            .list_provider_configs()?
            .into_iter()
            .filter(|c| c.is_enabled)
        {
            let Some(snapshot) = self.store.latest_snapshot(&config.provider_id)? else {
                stale_providers.push(config.provider_id.clone());
                providers.push(ProviderDashboardData {
                    provider_id: config.provider_id,
                    name: config.name,
                    metrics: BTreeMap::new(),
                    last_fetched: config.last_fetch_at,
                    is_stale: true,
                    fetch_interval_minutes: config.fetch_interval_minutes,
                });
                continue;
            };

            let last_fetched = config.last_fetch_at.unwrap_or(snapshot.snapshot_time);
            let age = minutes_between(last_fetched, now);
            let is_stale = age >= config.fetch_interval_minutes as f64;

            if is_stale {
                stale_providers.push(config.provider_id.clone());
            }
            oldest_age = oldest_age.max(age);

            providers.push(ProviderDashboardData {
                provider_id: config.provider_id,
                name: config.name,
                metrics: snapshot.metrics,
                last_fetched: Some(last_fetched),
                is_stale,
                fetch_interval_minutes: config.fetch_interval_minutes,
            });
        }

        Ok(DashboardMetrics {
            providers,
            last_updated: now,
            staleness: StalenessInfo {
                has_stale_data: !stale_providers.is_empty(),
                stale_providers,
                oldest_data_age_minutes: oldest_age.round() as i64,
            },
        })
    }

    /// Snapshots dated within the last `days` days of `today`, oldest first.
    pub fn provider_history(
        &self,
        provider_id: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<MetricsSnapshot>> {
        let since = today
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);
        self.store.snapshots_since(provider_id, since)
    }

    pub fn provider_staleness(
        &self,
        provider_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProviderStaleness> {
        let config = self.store.get_provider_config(provider_id)?;
        let Some((interval, last_fetch_at)) = config
            .and_then(|c| c.last_fetch_at.map(|last| (c.fetch_interval_minutes, last)))
        else {
            return Ok(ProviderStaleness {
                is_stale: true,
                minutes_old: None,
            });
        };

        let minutes_old = minutes_between(last_fetch_at, now);
        Ok(ProviderStaleness {
            is_stale: minutes_old >= interval as f64,
            minutes_old: Some(minutes_old.round() as i64),
        })
    }

    /// Compares each metric of the latest snapshot with the one before it.
    pub fn metric_trends(&self, provider_id: &str) -> Result<Vec<MetricTrend>> {
        let mut recent = self.store.latest_snapshots(provider_id, 2)?.into_iter();
        let Some(current) = recent.next() else {
            return Ok(Vec::new());
        };
        let previous = recent.next();

        Ok(current
            .metrics
            .into_iter()
            .map(|(key, metric)| {
                let previous_value = previous
                    .as_ref()
                    .and_then(|p| p.metrics.get(&key))
                    .map(|m| m.value.clone());
                compare_metric(key, metric, previous_value)
            })
            .collect())
    }

    /// Most recent fetch attempts first.
    pub fn provider_fetch_logs(&self, provider_id: &str, limit: i64) -> Result<Vec<FetchLog>> {
        self.store.recent_fetch_logs(provider_id, limit)
    }

    /// All configurations ordered by name.
    pub fn all_provider_configs(&self) -> Result<Vec<ProviderConfig>> {
        self.store.list_provider_configs()
    }

    pub fn provider_config(&self, provider_id: &str) -> Result<Option<ProviderConfig>> {
        self.store.get_provider_config(provider_id)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let active_providers = self
            .store
            .list_provider_configs()?
            .iter()
            .filter(|c| c.is_enabled)
            .count() as i64;

        Ok(DashboardStats {
            total_snapshots: self.store.count_snapshots()?,
            total_logs: self.store.count_fetch_logs()?,
            active_providers,
            last_fetch: self.store.last_fetch_started_at()?,
        })
    }
}

fn compare_metric(key: String, metric: MetricValue, previous: Option<MetricData>) -> MetricTrend {
    let change = match (metric.value.as_f64(), previous.as_ref().and_then(MetricData::as_f64)) {
        (Some(current), Some(prior)) => Some(percent_change(current, prior)),
        _ => None,
    };
    let change_direction = change
        .map(ChangeDirection::from_change)
        .unwrap_or(ChangeDirection::Neutral);

    MetricTrend {
        metric_key: key,
        label: metric.label,
        current_value: metric.value,
        previous_value: previous,
        change,
        change_direction,
        trend: change_direction.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::model::NewMetricsSnapshot;
    use crate::metrics::testing::{config, metrics_at, ts, MockMetricsStore};
    use metricsdeck_providers::{MetricType, ProviderMetrics};

    fn queries(store: &MockMetricsStore) -> MetricsQueries {
        MetricsQueries::new(Arc::new(store.clone()))
    }

    #[test]
    fn test_latest_metrics_round_trip() {
        let mut p = config("p", 60);
        p.last_fetch_at = Some(ts(2024, 3, 1, 12, 0));
        let store = MockMetricsStore::with_configs(vec![p]);
        store.add_snapshot(NewMetricsSnapshot::from(&metrics_at(
            "p",
            ts(2024, 3, 1, 12, 0),
            5.0,
        )));

        let dashboard = queries(&store)
            .latest_metrics(ts(2024, 3, 1, 12, 30))
            .unwrap();

        assert_eq!(dashboard.providers.len(), 1);
        let metric = &dashboard.providers[0].metrics["a"];
        assert_eq!(metric.value.as_f64(), Some(5.0));
        assert_eq!(metric.metric_type, MetricType::Count);
        assert_eq!(metric.label, "A");
        assert!(!dashboard.providers[0].is_stale);
        assert!(!dashboard.staleness.has_stale_data);
        assert_eq!(dashboard.staleness.oldest_data_age_minutes, 30);
    }

    #[test]
    fn test_latest_metrics_staleness() {
        let mut fresh = config("fresh", 60);
        fresh.last_fetch_at = Some(ts(2024, 3, 1, 11, 30));
        let mut old = config("old", 60);
        old.last_fetch_at = Some(ts(2024, 3, 1, 9, 0));
        let empty = config("empty", 60);
        let mut disabled = config("disabled", 60);
        disabled.is_enabled = false;
        let store = MockMetricsStore::with_configs(vec![fresh, old, empty, disabled]);
        store.add_snapshot((&metrics_at("fresh", ts(2024, 3, 1, 11, 30), 1.0)).into());
        store.add_snapshot((&metrics_at("old", ts(2024, 3, 1, 9, 0), 1.0)).into());

        let dashboard = queries(&store)
            .latest_metrics(ts(2024, 3, 1, 12, 0))
            .unwrap();

        let ids: Vec<_> = dashboard.providers.iter().map(|p| p.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["empty", "fresh", "old"]);
        assert_eq!(dashboard.staleness.stale_providers, vec!["empty", "old"]);
        assert!(dashboard.staleness.has_stale_data);
        assert_eq!(dashboard.staleness.oldest_data_age_minutes, 180);
        assert!(dashboard.providers[0].metrics.is_empty());
        assert!(dashboard.providers[0].last_fetched.is_none());
    }

    #[test]
    fn test_latest_metrics_falls_back_to_snapshot_time() {
        let store = MockMetricsStore::with_configs(vec![config("p", 60)]);
        store.add_snapshot((&metrics_at("p", ts(2024, 3, 1, 11, 0), 1.0)).into());

        let dashboard = queries(&store)
            .latest_metrics(ts(2024, 3, 1, 12, 0))
            .unwrap();

        assert_eq!(dashboard.providers[0].last_fetched, Some(ts(2024, 3, 1, 11, 0)));
        assert!(dashboard.providers[0].is_stale);
    }

    #[test]
    fn test_provider_history_window() {
        let store = MockMetricsStore::new();
        for day in [1, 5, 8, 10] {
            store.add_snapshot((&metrics_at("p", ts(2024, 3, day, 0, 0), day as f64)).into());
        }

        let history = queries(&store)
            .provider_history("p", 7, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
            .unwrap();

        let days: Vec<_> = history.iter().map(|s| s.snapshot_date.to_string()).collect();
        assert_eq!(days, vec!["2024-03-05", "2024-03-08", "2024-03-10"]);
    }

    #[test]
    fn test_provider_staleness() {
        let mut p = config("p", 60);
        p.last_fetch_at = Some(ts(2024, 3, 1, 10, 0));
        let store = MockMetricsStore::with_configs(vec![p, config("never", 60)]);
        let queries = queries(&store);

        let staleness = queries
            .provider_staleness("p", ts(2024, 3, 1, 10, 45))
            .unwrap();
        assert_eq!(
            staleness,
            ProviderStaleness {
                is_stale: false,
                minutes_old: Some(45)
            }
        );

        let staleness = queries
            .provider_staleness("p", ts(2024, 3, 1, 11, 0))
            .unwrap();
        assert!(staleness.is_stale);

        for id in ["never", "missing"] {
            let staleness = queries.provider_staleness(id, ts(2024, 3, 1, 11, 0)).unwrap();
            assert!(staleness.is_stale);
            assert!(staleness.minutes_old.is_none());
        }
    }

    #[test]
    fn test_metric_trends_compare_latest_two() {
        let store = MockMetricsStore::new();
        let mut older = ProviderMetrics::new("p", ts(2024, 3, 1, 0, 0));
        older
            .insert("users", MetricValue::count(100.0, "Users"))
            .insert("churn", MetricValue::percentage(5.0, "Churn"));
        let mut newer = ProviderMetrics::new("p", ts(2024, 3, 8, 0, 0));
        newer
            .insert("users", MetricValue::count(120.0, "Users"))
            .insert("churn", MetricValue::percentage(5.0, "Churn"))
            .insert("note", MetricValue::text("launch week", "Note"));
        store.add_snapshot((&older).into());
        store.add_snapshot((&newer).into());

        let trends = queries(&store).metric_trends("p").unwrap();
        let by_key: BTreeMap<_, _> = trends.iter().map(|t| (t.metric_key.as_str(), t)).collect();

        let users = by_key["users"];
        assert_eq!(users.change, Some(20.0));
        assert_eq!(users.change_direction, ChangeDirection::Up);
        assert_eq!(users.trend, Trend::Improving);
        assert_eq!(users.previous_value, Some(MetricData::Number(100.0)));

        let churn = by_key["churn"];
        assert_eq!(churn.change, Some(0.0));
        assert_eq!(churn.trend, Trend::Stable);

        let note = by_key["note"];
        assert!(note.change.is_none());
        assert!(note.previous_value.is_none());
        assert_eq!(note.change_direction, ChangeDirection::Neutral);
    }

    #[test]
    fn test_metric_trends_without_snapshots() {
        let store = MockMetricsStore::new();
        assert!(queries(&store).metric_trends("p").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        use crate::metrics::store::FetchLogStore;

        let mut disabled = config("b", 60);
        disabled.is_enabled = false;
        let store = MockMetricsStore::with_configs(vec![config("a", 60), disabled]);
        store.add_snapshot((&metrics_at("a", ts(2024, 3, 1, 0, 0), 1.0)).into());
        store.start_fetch_log("a", ts(2024, 3, 1, 0, 0)).await.unwrap();
        store.start_fetch_log("a", ts(2024, 3, 2, 0, 0)).await.unwrap();

        let stats = queries(&store).dashboard_stats().unwrap();

        assert_eq!(
            stats,
            DashboardStats {
                total_snapshots: 1,
                total_logs: 2,
                active_providers: 1,
                last_fetch: Some(ts(2024, 3, 2, 0, 0)),
            }
        );
    }
}
