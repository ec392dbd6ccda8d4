//! Google Analytics 4 provider implementation.
//!
//! This module provides web traffic metrics from the GA4 Data API:
//! - Active users and sessions for today, the trailing week and month,
//!   each compared against the preceding period
//! - Daily history for the last 90 days via `fetch_multiple`
//!
//! Authentication uses a service-account key (see [`auth`]).
//! API documentation: https://developers.google.com/analytics/devapi/data/v1

mod auth;
mod models;

pub use models::{BatchRunReportsResponse, ReportRow, RunReportResponse};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::models::{percent_change, MetricValue, ProviderMetrics};
use crate::provider::http::{build_client, send_json};
use crate::provider::{MetricsProvider, MetricsTransform, ProviderCapabilities};
use crate::registry::RateLimiter;
use crate::resilience::{with_retry, RetryPolicy};

use auth::ServiceAccountAuth;
use models::{
    BatchRunReportsRequest, DateRange, DimensionOrder, Named, OrderBy, RunReportRequest,
};

const BASE_URL: &str = "https://analyticsdata.googleapis.com/v1beta";
const PROVIDER_ID: &str = "ga4";
const PROVIDER_NAME: &str = "Google Analytics 4";
const FETCH_INTERVAL_MINUTES: u32 = 240;

const CURRENT_RANGE: &str = "date_range_0";
const PREVIOUS_RANGE: &str = "date_range_1";

/// GA4 property and credentials.
#[derive(Debug, Clone)]
pub struct Ga4Config {
    pub property_id: String,
    /// Full service-account key file contents.
    pub service_account_key: String,
}

/// Users and sessions for one period.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Traffic {
    pub users: f64,
    pub sessions: f64,
}

/// A period and the one before it.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PeriodComparison {
    pub current: Traffic,
    pub previous: Traffic,
}

impl PeriodComparison {
    /// Reads the `date_range_0`/`date_range_1` rows of a two-range report.
    pub fn from_report(report: Option<&RunReportResponse>) -> Self {
        let mut comparison = Self::default();

        for row in report.map(|r| r.rows.as_slice()).unwrap_or_default() {
            let traffic = Traffic {
                users: row.metric(0),
                sessions: row.metric(1),
            };
            match row.dimension(0) {
                Some(CURRENT_RANGE) => comparison.current = traffic,
                Some(PREVIOUS_RANGE) => comparison.previous = traffic,
                _ => {}
            }
        }

        comparison
    }

    pub fn users_change(&self) -> f64 {
        percent_change(self.current.users, self.previous.users)
    }

    pub fn sessions_change(&self) -> f64 {
        percent_change(self.current.sessions, self.previous.sessions)
    }
}

/// Google Analytics 4 provider.
pub struct Ga4Provider {
    client: Client,
    property_id: String,
    auth: ServiceAccountAuth,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl Ga4Provider {
    pub fn new(config: Ga4Config) -> Result<Self, FetchError> {
        let property_id = config.property_id.trim().to_string();
        if property_id.is_empty() {
            return Err(FetchError::Config {
                provider: PROVIDER_ID.to_string(),
                message: "GA4 property ID is required".to_string(),
            });
        }
        if config.service_account_key.trim().is_empty() {
            return Err(FetchError::Config {
                provider: PROVIDER_ID.to_string(),
                message: "GA4 service account key (JSON) is required".to_string(),
            });
        }

        let auth = ServiceAccountAuth::from_json(PROVIDER_ID, &config.service_account_key)?;

        info!(provider = PROVIDER_ID, property = %property_id, "Initialized GA4 provider");

        Ok(Self {
            client: build_client(),
            property_id,
            auth,
            limiter: RateLimiter::for_service(PROVIDER_ID),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn post_report<B, T>(&self, method: &str, body: &B) -> Result<T, FetchError>
    where
        B: Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let token = self.auth.access_token(&self.client).await?;
        let url = format!("{}/properties/{}:{}", BASE_URL, self.property_id, method);
        let request = self.client.post(&url).bearer_auth(token).json(body);
        send_json(PROVIDER_ID, request).await
    }

    fn traffic_batch() -> BatchRunReportsRequest {
        BatchRunReportsRequest {
            requests: vec![
                // Today vs yesterday
                RunReportRequest::traffic(vec![
                    DateRange::new("today", "today"),
                    DateRange::new("yesterday", "yesterday"),
                ]),
                // This week vs last week
                RunReportRequest::traffic(vec![
                    DateRange::new("7daysAgo", "today"),
                    DateRange::new("14daysAgo", "8daysAgo"),
                ]),
                // This month vs last month
                RunReportRequest::traffic(vec![
                    DateRange::new("30daysAgo", "today"),
                    DateRange::new("60daysAgo", "31daysAgo"),
                ]),
            ],
        }
    }

    fn daily_history() -> RunReportRequest {
        RunReportRequest {
            dimensions: vec![Named::new("date")],
            order_bys: vec![OrderBy {
                dimension: DimensionOrder {
                    dimension_name: "date",
                },
                desc: false,
            }],
            ..RunReportRequest::traffic(vec![DateRange::new("90daysAgo", "yesterday")])
        }
    }
}

#[async_trait]
impl MetricsProvider for Ga4Provider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn fetch_interval_minutes(&self) -> u32 {
        FETCH_INTERVAL_MINUTES
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_history: true,
        }
    }

    async fn fetch(&self) -> Result<ProviderMetrics, FetchError> {
        let body = Self::traffic_batch();
        with_retry(PROVIDER_ID, &self.retry_policy, || {
            let body = &body;
            async move {
                debug!(provider = PROVIDER_ID, "Fetching GA4 traffic report");
                let raw: BatchRunReportsResponse = self
                    .limiter
                    .execute(|| self.post_report("batchRunReports", body))
                    .await?;
                Ok(self.transform(raw))
            }
        })
        .await
    }

    async fn fetch_multiple(&self) -> Result<Vec<ProviderMetrics>, FetchError> {
        let body = Self::daily_history();
        with_retry(PROVIDER_ID, &self.retry_policy, || {
            let body = &body;
            async move {
                debug!(provider = PROVIDER_ID, "Fetching 90 days of GA4 history");
                let raw: RunReportResponse = self
                    .limiter
                    .execute(|| self.post_report("runReport", body))
                    .await?;
                Ok(transform_daily(&raw))
            }
        })
        .await
    }

    async fn validate_config(&self) -> bool {
        let body = RunReportRequest {
            metrics: vec![Named::new("sessions")],
            ..RunReportRequest::traffic(vec![DateRange::new("yesterday", "yesterday")])
        };

        let result: Result<RunReportResponse, FetchError> = self
            .limiter
            .execute(|| self.post_report("runReport", &body))
            .await;

        match result {
            Ok(_) => {
                info!(provider = PROVIDER_ID, "GA4 configuration is valid");
                true
            }
            Err(e) => {
                warn!(provider = PROVIDER_ID, error = %e, "GA4 configuration is invalid");
                false
            }
        }
    }
}

impl MetricsTransform for Ga4Provider {
    type Raw = BatchRunReportsResponse;

    fn transform(&self, raw: BatchRunReportsResponse) -> ProviderMetrics {
        transform_batch(&raw, Utc::now())
    }
}

/// Builds the current-traffic snapshot from the three-report batch.
fn transform_batch(raw: &BatchRunReportsResponse, now: DateTime<Utc>) -> ProviderMetrics {
    let today = PeriodComparison::from_report(raw.reports.first());
    let week = PeriodComparison::from_report(raw.reports.get(1));
    let month = PeriodComparison::from_report(raw.reports.get(2));

    let mut metrics = ProviderMetrics::new(PROVIDER_ID, now);
    for (prefix, period, label) in [
        ("today", &today, "Today"),
        ("week", &week, "This Week"),
        ("month", &month, "This Month"),
    ] {
        metrics
            .insert(
                format!("{}_users", prefix),
                MetricValue::count(period.current.users, format!("Users {}", label))
                    .with_change(period.users_change()),
            )
            .insert(
                format!("{}_sessions", prefix),
                MetricValue::count(period.current.sessions, format!("Sessions {}", label))
                    .with_change(period.sessions_change()),
            );
    }

    metrics.with_metadata(json!({
        "today": today.current,
        "thisWeek": week.current,
        "thisMonth": month.current,
    }))
}

/// One snapshot per `date` row, stamped at that day's midnight UTC.
fn transform_daily(raw: &RunReportResponse) -> Vec<ProviderMetrics> {
    let snapshots: Vec<ProviderMetrics> = raw
        .rows
        .iter()
        .filter_map(|row| {
            let value = row.dimension(0).unwrap_or_default();
            let date = match NaiveDate::parse_from_str(value, "%Y%m%d") {
                Ok(date) => date,
                Err(e) => {
                    warn!(provider = PROVIDER_ID, date = value, error = %e, "Skipping GA4 row");
                    return None;
                }
            };
            let timestamp = date.and_hms_opt(0, 0, 0)?.and_utc();

            let mut snapshot = ProviderMetrics::new(PROVIDER_ID, timestamp);
            snapshot
                .insert("users", MetricValue::count(row.metric(0), "Users"))
                .insert("sessions", MetricValue::count(row.metric(1), "Sessions"));
            Some(snapshot.with_metadata(json!({
                "date": date.format("%Y-%m-%d").to_string(),
            })))
        })
        .collect();

    debug!(provider = PROVIDER_ID, snapshots = snapshots.len(), "Built GA4 daily snapshots");
    snapshots
}
