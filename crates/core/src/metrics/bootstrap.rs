//! Builds providers from credentials found in the environment.

use std::sync::Arc;

use log::{debug, error};

use metricsdeck_providers::{
    AttioConfig, AttioProvider, Ga4Config, Ga4Provider, MetricsProvider, NotionConfig,
    NotionProvider, ProviderRegistry,
};

use crate::errors::Result;

pub const ATTIO_API_KEY: &str = "ATTIO_API_KEY";
pub const ATTIO_OBJECT_SLUG: &str = "ATTIO_OBJECT_SLUG";
pub const GA4_PROPERTY_ID: &str = "GA4_PROPERTY_ID";
pub const GA4_SERVICE_ACCOUNT_KEY: &str = "GA4_SERVICE_ACCOUNT_KEY";
pub const NOTION_API_KEY: &str = "NOTION_API_KEY";
pub const NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";

/// Vendor credentials. Blank values are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub attio_api_key: Option<String>,
    pub attio_object_slug: Option<String>,
    pub ga4_property_id: Option<String>,
    pub ga4_service_account_key: Option<String>,
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
}

impl ProviderCredentials {
    /// Reads credentials from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through `lookup`, keyed by environment variable name.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            attio_api_key: read(ATTIO_API_KEY),
            attio_object_slug: read(ATTIO_OBJECT_SLUG),
            ga4_property_id: read(GA4_PROPERTY_ID),
            ga4_service_account_key: read(GA4_SERVICE_ACCOUNT_KEY),
            notion_api_key: read(NOTION_API_KEY),
            notion_database_id: read(NOTION_DATABASE_ID),
        }
    }

    pub fn has_attio(&self) -> bool {
        self.attio_api_key.is_some()
    }

    pub fn has_ga4(&self) -> bool {
        self.ga4_property_id.is_some() && self.ga4_service_account_key.is_some()
    }

    pub fn has_notion(&self) -> bool {
        self.notion_api_key.is_some() && self.notion_database_id.is_some()
    }

    /// Whether credentials for `provider_id` are present.
    pub fn has(&self, provider_id: &str) -> bool {
        match provider_id {
            "attio" => self.has_attio(),
            "ga4" => self.has_ga4(),
            "notion" => self.has_notion(),
            _ => false,
        }
    }
}

/// Constructs every provider whose credentials are present.
///
/// A provider whose configuration is rejected at construction is logged and
/// left out.
pub fn build_providers(credentials: &ProviderCredentials) -> Vec<Arc<dyn MetricsProvider>> {
    let mut providers: Vec<Arc<dyn MetricsProvider>> = Vec::new();

    if let (Some(api_key), Some(database_id)) = (
        &credentials.notion_api_key,
        &credentials.notion_database_id,
    ) {
        match NotionProvider::new(NotionConfig {
            api_key: api_key.clone(),
            database_id: database_id.clone(),
        }) {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => error!("Skipping notion provider: {}", e),
        }
    }

    if let Some(api_key) = &credentials.attio_api_key {
        match AttioProvider::new(AttioConfig {
            api_key: api_key.clone(),
            object_slug: credentials.attio_object_slug.clone(),
        }) {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => error!("Skipping attio provider: {}", e),
        }
    }

    if let (Some(property_id), Some(key)) = (
        &credentials.ga4_property_id,
        &credentials.ga4_service_account_key,
    ) {
        match Ga4Provider::new(Ga4Config {
            property_id: property_id.clone(),
            service_account_key: key.clone(),
        }) {
            Ok(provider) => providers.push(Arc::new(provider)),
            Err(e) => error!("Skipping ga4 provider: {}", e),
        }
    }

    providers
}

/// Replaces the contents of `registry` with every configured provider.
///
/// Returns how many providers were registered.
pub fn register_configured_providers(
    registry: &mut ProviderRegistry,
    credentials: &ProviderCredentials,
) -> Result<usize> {
    *registry = ProviderRegistry::from_providers(build_providers(credentials))?;
    debug!("Registered providers: {:?}", registry.ids());
    Ok(registry.count())
}
