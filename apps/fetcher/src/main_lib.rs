use std::sync::Arc;

use tokio::sync::RwLock;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use metricsdeck_core::metrics::{
    ensure_provider_configs, FetchOrchestrator, MetricsActions, MetricsQueries, MetricsStore,
    OrchestratorConfig, ProviderCredentials,
};
use metricsdeck_providers::ProviderRegistry;
use metricsdeck_storage_sqlite::{db, MetricsRepository};

use crate::config::{Config, LogFormat};

pub struct AppState {
    pub actions: MetricsActions,
    pub queries: MetricsQueries,
}

pub fn init_tracing(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

pub async fn build_state(
    config: &Config,
    credentials: ProviderCredentials,
) -> anyhow::Result<AppState> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());
    let repository = Arc::new(MetricsRepository::new(pool, writer));

    let configs = ensure_provider_configs(repository.as_ref(), &credentials).await?;
    tracing::info!(
        "{} provider configs present, {} enabled",
        configs.len(),
        configs.iter().filter(|c| c.is_enabled).count()
    );

    let store: Arc<dyn MetricsStore> = repository;
    let orchestrator = Arc::new(FetchOrchestrator::with_config(
        Arc::clone(&store),
        OrchestratorConfig {
            provider_timeout: config.fetch_timeout,
            ..OrchestratorConfig::default()
        },
    ));
    let registry = Arc::new(RwLock::new(ProviderRegistry::new()));

    Ok(AppState {
        actions: MetricsActions::new(registry, orchestrator, credentials),
        queries: MetricsQueries::new(store),
    })
}
