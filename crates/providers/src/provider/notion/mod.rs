//! Notion provider implementation.
//!
//! Reads manually entered metrics from a Notion database. Two row layouts
//! are understood:
//! - LinkedIn rows: one row per week with a fixed set of number columns
//! - Generic rows: one metric per row (title, value, optional type)
//!
//! Notion allows roughly three requests per second per integration.
//! API documentation: https://developers.notion.com/reference

mod models;

pub use models::{NotionPage, NotionProperties, NotionProperty, NotionQueryResponse, NotionResult};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::models::{MetricData, MetricType, MetricValue, ProviderMetrics};
use crate::provider::http::{build_client, send_json};
use crate::provider::{MetricsProvider, MetricsTransform, ProviderCapabilities};
use crate::registry::RateLimiter;
use crate::resilience::{with_retry, RetryPolicy};

use models::NotionQueryRequest;

const BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const PROVIDER_ID: &str = "notion";
const PROVIDER_NAME: &str = "Notion";
const FETCH_INTERVAL_MINUTES: u32 = 1440;
const PAGE_SIZE: u32 = 100;

/// LinkedIn columns and the labels their metrics are stored under.
const LINKEDIN_COLUMNS: [(&str, &str); 3] = [
    ("Linkedin_content_engagement", "LinkedIn Content Engagement"),
    ("Linkedin_impressions", "LinkedIn Impressions"),
    ("Linkedin_followers_stats", "LinkedIn Followers"),
];

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex =
        Regex::new(r"[^a-z0-9]+").expect("Invalid regex pattern");
}

/// Integration token and database to read.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_id: String,
}

/// One metric read from a row.
#[derive(Debug, Clone, PartialEq)]
pub struct NotionMetric {
    pub name: String,
    pub value: MetricData,
    pub metric_type: MetricType,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub date: DateTime<Utc>,
}

impl NotionMetric {
    fn to_metric_value(&self) -> MetricValue {
        MetricValue::new(self.value.clone(), self.metric_type, self.name.clone())
    }
}

/// A database row, classified by layout.
#[derive(Debug, Clone, PartialEq)]
pub enum NotionRow {
    /// A weekly row carrying several LinkedIn counts.
    LinkedIn {
        date: DateTime<Utc>,
        metrics: Vec<NotionMetric>,
    },
    /// A single named metric.
    Generic(NotionMetric),
}

impl NotionRow {
    /// Classifies a page. Returns `None` for generic rows without a title.
    pub fn from_page(page: &NotionPage) -> Option<Self> {
        let props = &page.properties;
        let date = props
            .get("Date")
            .and_then(NotionProperty::date_start)
            .unwrap_or(page.created_time);

        let is_linkedin = LINKEDIN_COLUMNS
            .iter()
            .any(|(column, _)| props.contains_key(*column));

        if is_linkedin {
            let metrics = LINKEDIN_COLUMNS
                .iter()
                .filter_map(|(column, label)| {
                    let value = props.get(*column)?.number()?;
                    Some(NotionMetric {
                        name: label.to_string(),
                        value: MetricData::Number(value),
                        metric_type: MetricType::Count,
                        category: None,
                        notes: None,
                        date,
                    })
                })
                .collect();
            return Some(Self::LinkedIn { date, metrics });
        }

        let name = props
            .values()
            .find(|p| p.is_title())
            .and_then(NotionProperty::title_text)?
            .to_string();

        // First number in column order, as the API lists them.
        let number = props.values().find_map(NotionProperty::number);
        let text_property = props
            .get("Value")
            .or_else(|| props.values().find(|p| p.is_rich_text()));
        let value = match (number, text_property) {
            (Some(n), _) => MetricData::Number(n),
            (None, Some(text)) => {
                MetricData::Text(text.plain_text().unwrap_or_else(|| "0".to_string()))
            }
            (None, None) => MetricData::Number(0.0),
        };

        let metric_type = props
            .get("Type")
            .and_then(NotionProperty::select_name)
            .and_then(MetricType::parse)
            .unwrap_or(MetricType::Count);

        Some(Self::Generic(NotionMetric {
            name,
            value,
            metric_type,
            category: props
                .get("Category")
                .and_then(NotionProperty::select_name)
                .map(str::to_string),
            notes: props.get("Notes").and_then(NotionProperty::plain_text),
            date,
        }))
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::LinkedIn { date, .. } => *date,
            Self::Generic(metric) => metric.date,
        }
    }

    pub fn metrics(&self) -> &[NotionMetric] {
        match self {
            Self::LinkedIn { metrics, .. } => metrics,
            Self::Generic(metric) => std::slice::from_ref(metric),
        }
    }
}

/// Storage key for a metric name: lowercase, runs of other characters
/// collapsed to `_`, no leading or trailing `_`.
///
/// ```
/// use metricsdeck_providers::provider::notion::normalize_metric_key;
///
/// assert_eq!(normalize_metric_key("LinkedIn Impressions"), "linkedin_impressions");
/// assert_eq!(normalize_metric_key("  MRR ($) "), "mrr");
/// ```
pub fn normalize_metric_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Notion database provider.
pub struct NotionProvider {
    client: Client,
    api_key: String,
    database_id: String,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl NotionProvider {
    pub fn new(config: NotionConfig) -> Result<Self, FetchError> {
        let api_key = config.api_key.trim().to_string();
        let database_id = config.database_id.trim().to_string();

        if api_key.is_empty() {
            return Err(FetchError::Config {
                provider: PROVIDER_ID.to_string(),
                message: "Notion API key is required".to_string(),
            });
        }
        if database_id.is_empty() {
            return Err(FetchError::Config {
                provider: PROVIDER_ID.to_string(),
                message: "Notion database ID is required".to_string(),
            });
        }

        info!(provider = PROVIDER_ID, database = %database_id, "Initialized Notion provider");

        Ok(Self {
            client: build_client(),
            api_key,
            database_id,
            limiter: RateLimiter::for_service(PROVIDER_ID),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn query_database(&self) -> Result<NotionQueryResponse, FetchError> {
        let url = format!("{}/databases/{}/query", BASE_URL, self.database_id);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&NotionQueryRequest::newest_first(PAGE_SIZE));

        send_json(PROVIDER_ID, request).await
    }

    async fn retrieve_database(&self) -> Result<Value, FetchError> {
        let url = format!("{}/databases/{}", BASE_URL, self.database_id);
        let request = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION);

        send_json(PROVIDER_ID, request).await
    }

    async fn query_with_retry(&self) -> Result<NotionQueryResponse, FetchError> {
        with_retry(PROVIDER_ID, &self.retry_policy, || async move {
            debug!(provider = PROVIDER_ID, "Querying Notion database");
            self.limiter.execute(|| self.query_database()).await
        })
        .await
    }
}

#[async_trait]
impl MetricsProvider for NotionProvider {
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
        let raw = self.query_with_retry().await?;
        Ok(self.transform(raw))
    }

    async fn fetch_multiple(&self) -> Result<Vec<ProviderMetrics>, FetchError> {
        let raw = self.query_with_retry().await?;
        Ok(transform_rows(&raw))
    }

    async fn validate_config(&self) -> bool {
        match self.limiter.execute(|| self.retrieve_database()).await {
            Ok(_) => {
                info!(provider = PROVIDER_ID, "Notion configuration is valid");
                true
            }
            Err(e) => {
                warn!(provider = PROVIDER_ID, error = %e, "Notion configuration is invalid");
                false
            }
        }
    }
}

impl MetricsTransform for NotionProvider {
    type Raw = NotionQueryResponse;

    fn transform(&self, raw: NotionQueryResponse) -> ProviderMetrics {
        transform_latest(&raw, Utc::now())
    }
}

fn parse_rows(raw: &NotionQueryResponse) -> Vec<NotionRow> {
    raw.results
        .iter()
        .filter_map(|result| {
            let page = match result {
                NotionResult::Page(page) => page,
                NotionResult::Malformed(value) => {
                    let reason = serde_json::from_value::<NotionPage>(value.clone())
                        .err()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "not a page".to_string());
                    let error = FetchError::MalformedRecord {
                        provider: PROVIDER_ID.to_string(),
                        record: value
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or("<unknown>")
                            .to_string(),
                        reason,
                    };
                    warn!(provider = PROVIDER_ID, error = %error, "Skipping Notion row");
                    return None;
                }
            };

            let row = NotionRow::from_page(page);
            if row.is_none() {
                debug!(provider = PROVIDER_ID, page = %page.id, "Notion row has no title");
            }
            row
        })
        .collect()
}

/// Latest value per metric key across all rows.
fn transform_latest(raw: &NotionQueryResponse, now: DateTime<Utc>) -> ProviderMetrics {
    debug!(provider = PROVIDER_ID, entries = raw.results.len(), "Transforming Notion entries");

    let rows = parse_rows(raw);
    let mut latest: BTreeMap<String, &NotionMetric> = BTreeMap::new();

    for metric in rows.iter().flat_map(NotionRow::metrics) {
        let key = normalize_metric_key(&metric.name);
        let is_newer = latest
            .get(&key)
            .map_or(true, |existing| metric.date > existing.date);
        if is_newer {
            latest.insert(key, metric);
        }
    }

    let mut metrics = ProviderMetrics::new(PROVIDER_ID, now);
    for (key, metric) in latest {
        metrics.insert(key, metric.to_metric_value());
    }

    metrics.with_metadata(json!({
        "totalEntries": raw.results.len(),
        "hasMore": raw.has_more,
    }))
}

/// One snapshot per row, stamped at the row's date.
///
/// Rows sharing a date produce snapshots with the same timestamp; stored by
/// (provider, time), the later row in the response replaces the earlier one.
fn transform_rows(raw: &NotionQueryResponse) -> Vec<ProviderMetrics> {
    let snapshots: Vec<ProviderMetrics> = parse_rows(raw)
        .into_iter()
        .filter(|row| !row.metrics().is_empty())
        .map(|row| {
            let date = row.date();
            let mut snapshot = ProviderMetrics::new(PROVIDER_ID, date);
            for metric in row.metrics() {
                snapshot.insert(normalize_metric_key(&metric.name), metric.to_metric_value());
            }
            snapshot.with_metadata(json!({
                "weekDate": date.to_rfc3339_opts(SecondsFormat::Millis, true),
            }))
        })
        .collect();

    debug!(provider = PROVIDER_ID, snapshots = snapshots.len(), "Built Notion weekly snapshots");
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn linkedin_page(id: &str, date: &str, engagement: Option<f64>, impressions: f64) -> Value {
        json!({
            "object": "page",
            "id": id,
            "created_time": "2026-03-10T09:00:00.000Z",
            "properties": {
                "Week": { "id": "a", "type": "title", "title": [{ "plain_text": "Week" }] },
                "Date": { "id": "b", "type": "date", "date": { "start": date } },
                "Linkedin_content_engagement": { "id": "c", "type": "number", "number": engagement },
                "Linkedin_impressions": { "id": "d", "type": "number", "number": impressions }
            }
        })
    }

    fn generic_page(name: &str, value: Value, created: &str) -> Value {
        json!({
            "object": "page",
            "id": format!("page-{}", name),
            "created_time": created,
            "properties": {
                "Name": { "id": "t", "type": "title", "title": [{ "plain_text": name }] },
                "Value": value,
                "Type": { "id": "s", "type": "select", "select": { "name": "Currency" } },
                "Notes": { "id": "n", "type": "rich_text", "rich_text": [
                    { "plain_text": "from " }, { "plain_text": "finance" }
                ] },
                "Owner": { "id": "p", "type": "people", "people": [] }
            }
        })
    }

    fn response(results: Vec<Value>, has_more: bool) -> NotionQueryResponse {
        serde_json::from_value(json!({ "results": results, "has_more": has_more })).unwrap()
    }

    #[test]
    fn test_generic_row_takes_first_number_in_column_order() {
        // Column names deliberately sort in the opposite order.
        let body = r#"{
            "results": [{
                "object": "page",
                "id": "p-order",
                "created_time": "2026-03-01T00:00:00.000Z",
                "properties": {
                    "Name": { "type": "title", "title": [{ "plain_text": "Signups" }] },
                    "Zeta": { "type": "number", "number": 42 },
                    "Alpha": { "type": "number", "number": 7 }
                }
            }],
            "has_more": false
        }"#;
        let raw: NotionQueryResponse = serde_json::from_str(body).unwrap();

        match &raw.results[0] {
            NotionResult::Page(page) => {
                let names: Vec<_> = page.properties.names().collect();
                assert_eq!(names, vec!["Name", "Zeta", "Alpha"]);
            }
            other => panic!("expected a page, got {:?}", other),
        }

        let metrics = transform_latest(&raw, now());
        assert_eq!(metrics.metrics["signups"].value, MetricData::Number(42.0));
    }

    #[test]
    fn test_generic_rows_on_same_date_share_a_timestamp() {
        let first = generic_page(
            "MRR",
            json!({ "id": "v", "type": "number", "number": 100.0 }),
            "2026-03-01T00:00:00.000Z",
        );
        let second = generic_page(
            "ARR",
            json!({ "id": "v", "type": "number", "number": 1200.0 }),
            "2026-03-01T00:00:00.000Z",
        );

        let snapshots = transform_rows(&response(vec![first, second], false));
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].timestamp, snapshots[1].timestamp);
        assert!(snapshots[0].metrics.contains_key("mrr"));
        assert!(snapshots[1].metrics.contains_key("arr"));
    }

    #[test]
    fn test_normalize_metric_key() {
        assert_eq!(normalize_metric_key("Monthly Revenue"), "monthly_revenue");
        assert_eq!(normalize_metric_key("__ARR (USD)__"), "arr_usd");
        assert_eq!(normalize_metric_key("NPS"), "nps");
    }

    #[test]
    fn test_linkedin_row_yields_one_metric_per_present_column() {
        let page: NotionPage =
            serde_json::from_value(linkedin_page("p1", "2026-03-09", None, 5400.0)).unwrap();

        match NotionRow::from_page(&page) {
            Some(NotionRow::LinkedIn { date, metrics }) => {
                assert_eq!(date, Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap());
                assert_eq!(metrics.len(), 1);
                assert_eq!(metrics[0].name, "LinkedIn Impressions");
                assert_eq!(metrics[0].value, MetricData::Number(5400.0));
            }
            other => panic!("expected LinkedIn row, got {:?}", other),
        }
    }

    #[test]
    fn test_generic_row_fields() {
        let value = json!({ "id": "v", "type": "number", "number": 1250.5 });
        let page: NotionPage = serde_json::from_value(generic_page(
            "MRR",
            value,
            "2026-03-01T00:00:00.000Z",
        ))
        .unwrap();

        match NotionRow::from_page(&page) {
            Some(NotionRow::Generic(metric)) => {
                assert_eq!(metric.name, "MRR");
                assert_eq!(metric.value, MetricData::Number(1250.5));
                assert_eq!(metric.metric_type, MetricType::Currency);
                assert_eq!(metric.notes.as_deref(), Some("from finance"));
                assert_eq!(metric.category, None);
                assert_eq!(
                    metric.date,
                    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
                );
            }
            other => panic!("expected generic row, got {:?}", other),
        }
    }

    #[test]
    fn test_generic_row_text_value() {
        let value = json!({ "id": "v", "type": "rich_text", "rich_text": [] });
        let page: NotionPage =
            serde_json::from_value(generic_page("Status", value, "2026-03-01T00:00:00Z")).unwrap();

        match NotionRow::from_page(&page) {
            Some(NotionRow::Generic(metric)) => {
                assert_eq!(metric.value, MetricData::Text("0".to_string()));
            }
            other => panic!("expected generic row, got {:?}", other),
        }
    }

    #[test]
    fn test_latest_date_wins_per_key() {
        let older = generic_page(
            "MRR",
            json!({ "id": "v", "type": "number", "number": 100.0 }),
            "2026-02-01T00:00:00.000Z",
        );
        let newer = generic_page(
            "mrr",
            json!({ "id": "v", "type": "number", "number": 200.0 }),
            "2026-03-01T00:00:00.000Z",
        );
        let raw = response(vec![older, newer, json!({ "object": "database" })], true);

        let metrics = transform_latest(&raw, now());
        assert_eq!(metrics.metric_count(), 1);
        assert_eq!(metrics.metrics["mrr"].value, MetricData::Number(200.0));
        assert_eq!(metrics.metrics["mrr"].label, "mrr");
        assert_eq!(
            metrics.metadata.unwrap(),
            json!({ "totalEntries": 3, "hasMore": true })
        );
    }

    #[test]
    fn test_rows_become_weekly_snapshots() {
        let raw = response(
            vec![
                linkedin_page("w2", "2026-03-09", Some(320.0), 5400.0),
                linkedin_page("w1", "2026-03-02", Some(300.0), 5000.0),
            ],
            false,
        );

        let snapshots = transform_rows(&raw);
        assert_eq!(snapshots.len(), 2);

        let latest = &snapshots[0];
        assert_eq!(latest.timestamp, Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(latest.metric_count(), 2);
        assert_eq!(
            latest.metrics["linkedin_content_engagement"].value,
            MetricData::Number(320.0)
        );
        assert_eq!(
            latest.metadata.as_ref().unwrap()["weekDate"],
            json!("2026-03-09T00:00:00.000Z")
        );
    }

    #[test]
    fn test_config_requires_key_and_database() {
        let result = NotionProvider::new(NotionConfig {
            api_key: "secret".to_string(),
            database_id: " ".to_string(),
        });
        assert!(matches!(result, Err(FetchError::Config { .. })));
    }
}
