//! Fetch orchestration.
//!
//! Fans fetches out over providers, records one fetch log per attempt,
//! persists snapshots idempotently and advances each provider's schedule
//! only when its fetch succeeded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::time::Instant;

use metricsdeck_providers::{with_timeout, FetchError, MetricsProvider, ProviderMetrics};

use super::model::{
    FetchLogCompletion, FetchResult, NewMetricsSnapshot, ProviderFetchUpdate, ProviderStatus,
};
use super::store::MetricsStore;
use crate::errors::Result;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound for one provider's whole fetch, retries included.
    /// `None` leaves calls bounded only by the HTTP client timeout.
    pub provider_timeout: Option<Duration>,
    /// Use `fetch_multiple` for providers that support history.
    pub prefer_history: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: None,
            prefer_history: true,
        }
    }
}

/// What a successful fetch produced.
struct FetchOutcome {
    latest: ProviderMetrics,
    records: i32,
}

pub struct FetchOrchestrator {
    store: Arc<dyn MetricsStore>,
    config: OrchestratorConfig,
}

impl FetchOrchestrator {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self::with_config(store, OrchestratorConfig::default())
    }

    pub fn with_config(store: Arc<dyn MetricsStore>, config: OrchestratorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Fetches every provider concurrently.
    ///
    /// One provider failing never affects the others. Results come back in
    /// input order.
    pub async fn fetch_all(&self, providers: &[Arc<dyn MetricsProvider>]) -> Vec<FetchResult> {
        info!("Starting parallel fetch for {} providers", providers.len());
        let started = Instant::now();

        let outcomes = join_all(providers.iter().map(|p| self.fetch_provider(p))).await;

        info!(
            "Completed all fetches in {}ms",
            started.elapsed().as_millis()
        );

        providers
            .iter()
            .zip(outcomes)
            .map(|(provider, outcome)| match outcome {
                Ok(data) => FetchResult::success(provider.id(), data),
                Err(e) => FetchResult::failure(provider.id(), e.to_string()),
            })
            .collect()
    }

    /// Fetches one provider and persists the result.
    ///
    /// Returns the most recent snapshot produced. On failure the fetch log is
    /// marked `FAILURE`, the provider's schedule is left untouched and the
    /// original error is returned.
    pub async fn fetch_provider(
        &self,
        provider: &Arc<dyn MetricsProvider>,
    ) -> Result<ProviderMetrics> {
        let provider_id = provider.id();
        let log = self.store.start_fetch_log(provider_id, Utc::now()).await?;
        let started = Instant::now();

        debug!("Fetching from {} ({})", provider.name(), provider_id);

        let result = match self.config.provider_timeout {
            Some(timeout) => {
                let bounded =
                    async { Ok::<_, FetchError>(self.fetch_and_persist(provider.as_ref()).await) };
                flatten_timeout(with_timeout(provider_id, timeout, bounded).await)
            }
            None => self.fetch_and_persist(provider.as_ref()).await,
        };
        let duration_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(outcome) => {
                let completion =
                    FetchLogCompletion::success(Utc::now(), duration_ms, outcome.records);
                self.store.complete_fetch_log(&log.id, completion).await?;
                info!(
                    "{} fetched {} metrics in {}ms",
                    provider_id, outcome.records, duration_ms
                );
                Ok(outcome.latest)
            }
            Err(error) => {
                warn!("{} fetch failed: {}", provider_id, error);
                let completion =
                    FetchLogCompletion::failure(Utc::now(), duration_ms, error.to_string());
                if let Err(log_error) = self.store.complete_fetch_log(&log.id, completion).await {
                    warn!(
                        "Failed to record fetch failure for {}: {}",
                        provider_id, log_error
                    );
                }
                Err(error)
            }
        }
    }

    async fn fetch_and_persist(&self, provider: &dyn MetricsProvider) -> Result<FetchOutcome> {
        let provider_id = provider.id();
        let use_history = self.config.prefer_history && provider.capabilities().supports_history;

        let snapshots = if use_history {
            provider.fetch_multiple().await?
        } else {
            vec![provider.fetch().await?]
        };

        if snapshots.is_empty() {
            return Err(FetchError::NoData {
                provider: provider_id.to_string(),
            }
            .into());
        }

        // Saved in the order the provider emitted them.
        for data in &snapshots {
            self.store
                .upsert_snapshot(NewMetricsSnapshot::from(data))
                .await?;
        }

        let records = snapshots.iter().map(|s| s.metric_count() as i32).sum();
        let latest = snapshots
            .into_iter()
            .reduce(|newest, next| {
                if next.timestamp > newest.timestamp {
                    next
                } else {
                    newest
                }
            })
            .ok_or_else(|| FetchError::NoData {
                provider: provider_id.to_string(),
            })?;

        self.advance_schedule(provider_id, Utc::now()).await?;

        Ok(FetchOutcome { latest, records })
    }

    /// Moves `last_fetch_at` to `now`. Providers without a config row are
    /// left alone.
    async fn advance_schedule(&self, provider_id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(config) = self.store.get_provider_config(provider_id)? else {
            debug!("No config row for {}, schedule not advanced", provider_id);
            return Ok(());
        };

        let update = ProviderFetchUpdate {
            last_fetch_at: now,
            next_fetch_at: now + chrono::Duration::minutes(config.fetch_interval_minutes as i64),
            status: ProviderStatus::Active,
        };
        self.store.record_successful_fetch(provider_id, update).await
    }

    /// Whether a provider is due for a fetch right now.
    pub fn should_refresh(&self, provider_id: &str) -> Result<bool> {
        self.should_refresh_at(provider_id, Utc::now())
    }

    /// Whether a provider is due for a fetch at `now`.
    ///
    /// A provider without a config row is always due.
    pub fn should_refresh_at(&self, provider_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(config) = self.store.get_provider_config(provider_id)? else {
            warn!("Provider config not found: {}", provider_id);
            return Ok(true);
        };

        if !config.is_enabled {
            return Ok(false);
        }

        let Some(last_fetch_at) = config.last_fetch_at else {
            return Ok(true);
        };

        Ok(minutes_between(last_fetch_at, now) >= config.fetch_interval_minutes as f64)
    }

    /// Filters `providers` down to the ones that are due.
    pub fn providers_to_refresh(
        &self,
        providers: &[Arc<dyn MetricsProvider>],
    ) -> Result<Vec<Arc<dyn MetricsProvider>>> {
        let now = Utc::now();
        let mut due = Vec::new();
        for provider in providers {
            if self.should_refresh_at(provider.id(), now)? {
                due.push(Arc::clone(provider));
            }
        }
        Ok(due)
    }

    /// Fetches only the providers that are due. Does nothing when none are.
    pub async fn fetch_stale(
        &self,
        providers: &[Arc<dyn MetricsProvider>],
    ) -> Result<Vec<FetchResult>> {
        let due = self.providers_to_refresh(providers)?;

        if due.is_empty() {
            debug!("No providers need refreshing");
            return Ok(Vec::new());
        }

        info!(
            "{} provider(s) need refreshing: {}",
            due.len(),
            due.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        Ok(self.fetch_all(&due).await)
    }
}

/// Fractional minutes from `from` to `to`.
pub(crate) fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// `with_timeout` speaks `FetchError`; the inner future speaks core errors.
fn flatten_timeout(
    result: std::result::Result<std::result::Result<FetchOutcome, crate::Error>, FetchError>,
) -> Result<FetchOutcome> {
    match result {
        Ok(inner) => inner,
        Err(timeout) => Err(timeout.into()),
    }
}
