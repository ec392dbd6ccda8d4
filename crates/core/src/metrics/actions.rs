//! Caller-facing entry points.
//!
//! Each action rebuilds the registry from the configured provider source and
//! reduces every outcome to a success flag, a message and per-provider
//! results. Errors never escape as `Err`.

use std::sync::Arc;

use log::error;
use serde::Serialize;
use tokio::sync::RwLock;

use metricsdeck_providers::{MetricsProvider, ProviderRegistry};

use super::bootstrap::{build_providers, ProviderCredentials};
use super::model::{FetchResult, FetchStatus};
use super::orchestrator::FetchOrchestrator;
use crate::errors::{Error, Result};

/// Produces the providers to register on each action.
pub type ProviderSource = Arc<dyn Fn() -> Vec<Arc<dyn MetricsProvider>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResultSummary {
    pub provider_id: String,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&FetchResult> for ProviderResultSummary {
    fn from(result: &FetchResult) -> Self {
        Self {
            provider_id: result.provider_id.clone(),
            status: result.status,
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ProviderResultSummary>,
}

impl ActionResponse {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            results: Vec::new(),
        }
    }

    fn from_results(results: &[FetchResult], message: impl FnOnce(usize) -> String) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            success: succeeded > 0,
            message: message(succeeded),
            results: results.iter().map(ProviderResultSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub message: String,
}

pub struct MetricsActions {
    registry: Arc<RwLock<ProviderRegistry>>,
    orchestrator: Arc<FetchOrchestrator>,
    source: ProviderSource,
}

impl MetricsActions {
    /// Actions that register providers built from `credentials`.
    pub fn new(
        registry: Arc<RwLock<ProviderRegistry>>,
        orchestrator: Arc<FetchOrchestrator>,
        credentials: ProviderCredentials,
    ) -> Self {
        let source: ProviderSource = Arc::new(move || build_providers(&credentials));
        Self::with_source(registry, orchestrator, source)
    }

    pub fn with_source(
        registry: Arc<RwLock<ProviderRegistry>>,
        orchestrator: Arc<FetchOrchestrator>,
        source: ProviderSource,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            source,
        }
    }

    /// Replaces the registry with the current providers and returns them in
    /// registration order. On a duplicate id the previous registry is kept.
    async fn refresh_registry(&self) -> Result<Vec<Arc<dyn MetricsProvider>>> {
        let fresh = ProviderRegistry::from_providers((self.source)())?;
        let providers = fresh.get_all();
        *self.registry.write().await = fresh;
        Ok(providers)
    }

    async fn lookup(&self, provider_id: &str) -> Result<Option<Arc<dyn MetricsProvider>>> {
        self.refresh_registry().await?;
        Ok(self.registry.read().await.get(provider_id))
    }

    /// Fetches every configured provider.
    pub async fn fetch_all(&self) -> ActionResponse {
        let providers = match self.refresh_registry().await {
            Ok(providers) => providers,
            Err(e) => {
                error!("fetch_all failed: {}", e);
                return ActionResponse::failed(e.to_string());
            }
        };

        if providers.is_empty() {
            return ActionResponse::failed("No providers configured");
        }

        let results = self.orchestrator.fetch_all(&providers).await;
        ActionResponse::from_results(&results, |succeeded| {
            format!(
                "Successfully fetched {}/{} providers",
                succeeded,
                providers.len()
            )
        })
    }

    /// Fetches one provider by id.
    pub async fn fetch_provider(&self, provider_id: &str) -> ActionResponse {
        let provider = match self.lookup(provider_id).await {
            Ok(Some(provider)) => provider,
            Ok(None) => {
                return ActionResponse::failed(
                    Error::ProviderNotFound(provider_id.to_string()).to_string(),
                )
            }
            Err(e) => {
                error!("fetch_provider({}) failed: {}", provider_id, e);
                return ActionResponse::failed(e.to_string());
            }
        };

        match self.orchestrator.fetch_provider(&provider).await {
            Ok(_) => ActionResponse {
                success: true,
                message: format!("Successfully fetched metrics from {}", provider.name()),
                results: vec![ProviderResultSummary {
                    provider_id: provider_id.to_string(),
                    status: FetchStatus::Success,
                    error: None,
                }],
            },
            Err(e) => {
                error!("fetch_provider({}) failed: {}", provider_id, e);
                ActionResponse {
                    success: false,
                    message: e.to_string(),
                    results: vec![ProviderResultSummary {
                        provider_id: provider_id.to_string(),
                        status: FetchStatus::Failure,
                        error: Some(e.to_string()),
                    }],
                }
            }
        }
    }

    /// Fetches only providers whose interval has elapsed.
    pub async fn fetch_stale(&self) -> ActionResponse {
        let providers = match self.refresh_registry().await {
            Ok(providers) => providers,
            Err(e) => {
                error!("fetch_stale failed: {}", e);
                return ActionResponse::failed(e.to_string());
            }
        };

        if providers.is_empty() {
            return ActionResponse::failed("No providers configured");
        }

        let results = match self.orchestrator.fetch_stale(&providers).await {
            Ok(results) => results,
            Err(e) => {
                error!("fetch_stale failed: {}", e);
                return ActionResponse::failed(e.to_string());
            }
        };

        if results.is_empty() {
            return ActionResponse {
                success: true,
                message: "All providers are up to date".to_string(),
                results: Vec::new(),
            };
        }

        ActionResponse::from_results(&results, |succeeded| {
            format!(
                "Refreshed {}/{} stale providers",
                succeeded,
                results.len()
            )
        })
    }

    /// Probes one provider's credentials.
    pub async fn validate_provider(&self, provider_id: &str) -> ValidationResponse {
        let provider = match self.lookup(provider_id).await {
            Ok(Some(provider)) => provider,
            Ok(None) => {
                return ValidationResponse {
                    valid: false,
                    message: format!("Provider \"{}\" not found", provider_id),
                }
            }
            Err(e) => {
                error!("validate_provider({}) failed: {}", provider_id, e);
                return ValidationResponse {
                    valid: false,
                    message: e.to_string(),
                };
            }
        };

        let valid = provider.validate_config().await;
        let verdict = if valid { "valid" } else { "invalid" };
        ValidationResponse {
            valid,
            message: format!("{} configuration is {}", provider.name(), verdict),
        }
    }
}
