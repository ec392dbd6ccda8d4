//! Metrics module - orchestration, persistence contracts and dashboard queries.

pub mod actions;
pub mod bootstrap;
pub mod model;
pub mod orchestrator;
pub mod queries;
pub mod seed;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{ActionResponse, MetricsActions, ProviderResultSummary, ProviderSource, ValidationResponse};
pub use bootstrap::{build_providers, register_configured_providers, ProviderCredentials};
pub use model::{
    FetchLog, FetchLogCompletion, FetchLogStatus, FetchResult, FetchStatus, MetricsSnapshot,
    NewMetricsSnapshot, NewProviderConfig, ProviderConfig, ProviderFetchUpdate, ProviderStatus,
};
pub use orchestrator::{FetchOrchestrator, OrchestratorConfig};
pub use queries::{
    DashboardMetrics, DashboardStats, MetricTrend, MetricsQueries, ProviderDashboardData,
    ProviderStaleness, StalenessInfo, Trend, DEFAULT_HISTORY_DAYS, DEFAULT_LOG_LIMIT,
};
pub use seed::ensure_provider_configs;
pub use store::{FetchLogStore, MetricsStore, ProviderConfigStore, SnapshotStore};
