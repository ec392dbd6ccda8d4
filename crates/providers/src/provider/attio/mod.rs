//! Attio CRM provider implementation.
//!
//! Reads every deal from a configurable Attio object and derives pipeline
//! activity metrics from the deals' stages:
//! - Intro calls and demos in the trailing week and month
//! - Pilot revenue
//! - Counts of deals awaiting scheduling, in evaluation and with intro calls
//!
//! API documentation: https://developers.attio.com/reference

mod models;

pub use models::{AttioDeal, AttioQueryResponse, PipelineStage};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::models::{MetricValue, ProviderMetrics};
use crate::provider::http::{build_client, send_json};
use crate::provider::{MetricsProvider, MetricsTransform};
use crate::registry::RateLimiter;
use crate::resilience::{with_retry, RetryPolicy};

use models::{AttioAttributeValue, AttioQueryRequest, AttioRecord};

const BASE_URL: &str = "https://api.attio.com/v2";
const PROVIDER_ID: &str = "attio";
const PROVIDER_NAME: &str = "Attio CRM";
const FETCH_INTERVAL_MINUTES: u32 = 30;

/// Maximum records Attio returns per query.
const QUERY_LIMIT: u32 = 500;

pub const DEFAULT_OBJECT_SLUG: &str = "deals";

const COMPANY_ATTRIBUTES: [&str; 3] = ["company_name", "name", "company"];
const STAGE_ATTRIBUTES: [&str; 2] = ["stage", "status"];
const VALUE_ATTRIBUTES: [&str; 3] = ["deal_value", "value", "amount"];
const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Credentials and target object for the Attio provider.
#[derive(Debug, Clone)]
pub struct AttioConfig {
    pub api_key: String,
    /// Object to query, e.g. "deals" or "opportunities".
    pub object_slug: Option<String>,
}

/// Attio CRM provider.
pub struct AttioProvider {
    client: Client,
    api_key: String,
    object_slug: String,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl AttioProvider {
    pub fn new(config: AttioConfig) -> Result<Self, FetchError> {
        let api_key = config.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(FetchError::Config {
                provider: PROVIDER_ID.to_string(),
                message: "Attio API key is required".to_string(),
            });
        }

        let object_slug = config
            .object_slug
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_OBJECT_SLUG.to_string());

        info!(provider = PROVIDER_ID, object = %object_slug, "Initialized Attio provider");

        Ok(Self {
            client: build_client(),
            api_key,
            object_slug,
            limiter: RateLimiter::for_service(PROVIDER_ID),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn query_records(&self, limit: u32) -> Result<AttioQueryResponse, FetchError> {
        let url = format!("{}/objects/{}/records/query", BASE_URL, self.object_slug);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&AttioQueryRequest::all(limit));

        send_json(PROVIDER_ID, request).await
    }
}

#[async_trait]
impl MetricsProvider for AttioProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn fetch_interval_minutes(&self) -> u32 {
        FETCH_INTERVAL_MINUTES
    }

    async fn fetch(&self) -> Result<ProviderMetrics, FetchError> {
        with_retry(PROVIDER_ID, &self.retry_policy, || async move {
            debug!(provider = PROVIDER_ID, "Fetching deals from Attio");
            let raw = self
                .limiter
                .execute(|| self.query_records(QUERY_LIMIT))
                .await?;
            Ok(self.transform(raw))
        })
        .await
    }

    async fn validate_config(&self) -> bool {
        match self.limiter.execute(|| self.query_records(1)).await {
            Ok(_) => {
                info!(provider = PROVIDER_ID, "Attio configuration is valid");
                true
            }
            Err(e) => {
                warn!(provider = PROVIDER_ID, error = %e, "Attio configuration is invalid");
                false
            }
        }
    }
}

impl MetricsTransform for AttioProvider {
    type Raw = AttioQueryResponse;

    fn transform(&self, raw: AttioQueryResponse) -> ProviderMetrics {
        transform_records(&raw, Utc::now())
    }
}

/// Builds the pipeline snapshot as of `now`.
fn transform_records(raw: &AttioQueryResponse, now: DateTime<Utc>) -> ProviderMetrics {
    debug!(provider = PROVIDER_ID, records = raw.data.len(), "Transforming Attio records");

    let deals: Vec<AttioDeal> = raw
        .data
        .iter()
        .filter_map(|record| match parse_deal(record, now) {
            Ok(deal) => Some(deal),
            Err(e) => {
                warn!(provider = PROVIDER_ID, error = %e, "Skipping Attio record");
                None
            }
        })
        .collect();

    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);

    let count = |pred: fn(&AttioDeal, DateTime<Utc>) -> bool, since: DateTime<Utc>| {
        deals.iter().filter(|d| pred(*d, since)).count()
    };

    let intro_call_created = |d: &AttioDeal, since: DateTime<Utc>| {
        d.stage == PipelineStage::IntroCall && d.created_at >= since
    };
    let demo_entered = |d: &AttioDeal, since: DateTime<Utc>| {
        d.stage == PipelineStage::Demo && d.stage_changed_at >= since
    };

    let intro_calls_this_week = count(intro_call_created, week_ago);
    let intro_calls_this_month = count(intro_call_created, month_ago);
    let demos_this_week = count(demo_entered, week_ago);
    let demos_this_month = count(demo_entered, month_ago);

    let pilot_revenue: f64 = deals
        .iter()
        .filter(|d| d.stage == PipelineStage::Pilot)
        .filter_map(|d| d.deal_value)
        .sum();

    let in_stage = |stage: PipelineStage| deals.iter().filter(|d| d.stage == stage).count();
    let evaluation_count = in_stage(PipelineStage::Evaluation);
    let scheduling_count = in_stage(PipelineStage::Scheduling);
    let intro_calls_count = in_stage(PipelineStage::IntroCall);

    let mut metrics = ProviderMetrics::new(PROVIDER_ID, now);
    metrics
        .insert(
            "intro_calls_this_week",
            MetricValue::count(intro_calls_this_week, "Intro Calls This Week"),
        )
        .insert(
            "intro_calls_this_month",
            MetricValue::count(intro_calls_this_month, "Intro Calls This Month"),
        )
        .insert(
            "demos_this_week",
            MetricValue::count(demos_this_week, "Demos This Week"),
        )
        .insert(
            "demos_this_month",
            MetricValue::count(demos_this_month, "Demos This Month"),
        )
        .insert(
            "pilot_revenue",
            MetricValue::currency(pilot_revenue, "Pilot Revenue"),
        )
        .insert(
            "evaluation_count",
            MetricValue::count(evaluation_count, "Active Opportunities"),
        )
        .insert(
            "scheduling_count",
            MetricValue::count(scheduling_count, "Need to Schedule"),
        )
        .insert(
            "intro_calls_count",
            MetricValue::count(intro_calls_count, "Upcoming Intro Calls"),
        );

    metrics.with_metadata(json!({
        "totalDeals": deals.len(),
        "deals": deals,
    }))
}

fn parse_deal(raw: &Value, now: DateTime<Utc>) -> Result<AttioDeal, FetchError> {
    let malformed = |record: &str, reason: String| FetchError::MalformedRecord {
        provider: PROVIDER_ID.to_string(),
        record: record.to_string(),
        reason,
    };

    let record: AttioRecord = serde_json::from_value(raw.clone()).map_err(|e| {
        let id = raw
            .pointer("/id/record_id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>");
        malformed(id, e.to_string())
    })?;
    let record_id = record.id.record_id.as_str();

    let company_name = first_text(&record, &COMPANY_ATTRIBUTES)
        .unwrap_or(UNKNOWN_COMPANY)
        .to_string();

    let stage_title = first_text(&record, &STAGE_ATTRIBUTES)
        .ok_or_else(|| malformed(record_id, "no stage".to_string()))?;
    let stage = PipelineStage::parse(stage_title)
        .ok_or_else(|| malformed(record_id, format!("unknown stage '{}'", stage_title)))?;

    let deal_value = VALUE_ATTRIBUTES
        .iter()
        .filter_map(|slug| latest_value(&record, slug))
        .find_map(AttioAttributeValue::as_number);

    let stage_changed_at = STAGE_ATTRIBUTES
        .iter()
        .find_map(|slug| latest_value(&record, slug))
        .and_then(|v| v.active_from)
        .unwrap_or(record.created_at);

    let days_in_stage = (now - stage_changed_at).num_days().max(0);

    Ok(AttioDeal {
        record_id: record.id.record_id.clone(),
        company_name,
        stage,
        deal_value,
        created_at: record.created_at,
        stage_changed_at,
        days_in_stage,
        web_url: record.web_url.clone(),
    })
}

fn latest_value<'a>(record: &'a AttioRecord, slug: &str) -> Option<&'a AttioAttributeValue> {
    record.values.get(slug).and_then(|values| values.first())
}

fn first_text<'a>(record: &'a AttioRecord, slugs: &[&str]) -> Option<&'a str> {
    slugs
        .iter()
        .filter_map(|slug| latest_value(record, slug))
        .find_map(AttioAttributeValue::as_text)
}
