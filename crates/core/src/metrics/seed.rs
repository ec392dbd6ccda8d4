//! Initial provider configurations.

use log::info;
use serde_json::json;

use super::bootstrap::ProviderCredentials;
use super::model::{NewProviderConfig, ProviderConfig, ProviderStatus};
use super::store::ProviderConfigStore;
use crate::errors::Result;

struct SeedProvider {
    provider_id: &'static str,
    name: &'static str,
    status: ProviderStatus,
    fetch_interval_minutes: i32,
    description: &'static str,
    data_types: &'static [&'static str],
    /// Enabled from credential presence. Placeholders stay disabled.
    credential_gated: bool,
}

const SEED_PROVIDERS: &[SeedProvider] = &[
    SeedProvider {
        provider_id: "notion",
        name: "Notion",
        status: ProviderStatus::Active,
        fetch_interval_minutes: 1440,
        description: "Manual metrics tracking via Notion database",
        data_types: &["manual_entries", "custom_metrics"],
        credential_gated: true,
    },
    SeedProvider {
        provider_id: "attio",
        name: "Attio CRM",
        status: ProviderStatus::Inactive,
        fetch_interval_minutes: 240,
        description: "CRM deals and pipeline metrics",
        data_types: &["deals", "pipeline_value", "contacts"],
        credential_gated: true,
    },
    SeedProvider {
        provider_id: "ga4",
        name: "Google Analytics 4",
        status: ProviderStatus::Inactive,
        fetch_interval_minutes: 60,
        description: "Website traffic and engagement metrics",
        data_types: &["users", "sessions", "pageviews", "events"],
        credential_gated: true,
    },
    SeedProvider {
        provider_id: "phantombuster",
        name: "Phantombuster",
        status: ProviderStatus::Inactive,
        fetch_interval_minutes: 360,
        description: "Social media automation and outreach metrics",
        data_types: &["linkedin", "campaign_results"],
        credential_gated: false,
    },
    SeedProvider {
        provider_id: "finta",
        name: "Finta",
        status: ProviderStatus::Maintenance,
        fetch_interval_minutes: 1440,
        description: "Financial data and transactions",
        data_types: &["transactions", "accounts", "balance"],
        credential_gated: false,
    },
];

/// Creates missing provider configurations and syncs the enabled flag of
/// existing ones with the available credentials.
///
/// Schedules and statuses of existing rows are never touched.
pub async fn ensure_provider_configs(
    store: &dyn ProviderConfigStore,
    credentials: &ProviderCredentials,
) -> Result<Vec<ProviderConfig>> {
    for seed in SEED_PROVIDERS {
        let enabled = seed.credential_gated && credentials.has(seed.provider_id);

        match store.get_provider_config(seed.provider_id)? {
            Some(existing) => {
                if seed.credential_gated && existing.is_enabled != enabled {
                    store.set_provider_enabled(seed.provider_id, enabled).await?;
                    info!(
                        "Provider {} {}",
                        seed.provider_id,
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
            }
            None => {
                store
                    .insert_provider_config(NewProviderConfig {
                        provider_id: seed.provider_id.to_string(),
                        name: seed.name.to_string(),
                        is_enabled: enabled,
                        status: seed.status,
                        fetch_interval_minutes: seed.fetch_interval_minutes,
                        config: Some(json!({
                            "description": seed.description,
                            "dataTypes": seed.data_types,
                        })),
                    })
                    .await?;
                info!("Seeded provider config {}", seed.provider_id);
            }
        }
    }

    store.list_provider_configs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::MockMetricsStore;

    fn credentials(notion: bool, attio: bool) -> ProviderCredentials {
        ProviderCredentials {
            notion_api_key: notion.then(|| "key".to_string()),
            notion_database_id: notion.then(|| "db".to_string()),
            attio_api_key: attio.then(|| "key".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_seeds_every_provider() {
        let store = MockMetricsStore::new();

        let configs = ensure_provider_configs(&store, &credentials(true, false))
            .await
            .unwrap();

        assert_eq!(configs.len(), 5);
        let notion = store.config_of("notion").unwrap();
        assert!(notion.is_enabled);
        assert_eq!(notion.status, ProviderStatus::Active);
        assert_eq!(notion.fetch_interval_minutes, 1440);
        assert_eq!(
            notion.config.unwrap()["dataTypes"],
            json!(["manual_entries", "custom_metrics"])
        );

        let attio = store.config_of("attio").unwrap();
        assert!(!attio.is_enabled);
        assert_eq!(attio.fetch_interval_minutes, 240);
        assert_eq!(store.config_of("ga4").unwrap().fetch_interval_minutes, 60);

        let phantombuster = store.config_of("phantombuster").unwrap();
        assert!(!phantombuster.is_enabled);
        assert_eq!(phantombuster.fetch_interval_minutes, 360);
        assert_eq!(
            store.config_of("finta").unwrap().status,
            ProviderStatus::Maintenance
        );
    }

    #[tokio::test]
    async fn test_reseed_only_syncs_enabled_flag() {
        let store = MockMetricsStore::new();
        ensure_provider_configs(&store, &credentials(true, false))
            .await
            .unwrap();
        store.configs.lock().unwrap()[0].fetch_interval_minutes = 15;

        ensure_provider_configs(&store, &credentials(false, true))
            .await
            .unwrap();

        assert_eq!(store.configs.lock().unwrap().len(), 5);
        assert!(!store.config_of("notion").unwrap().is_enabled);
        assert_eq!(store.config_of("notion").unwrap().fetch_interval_minutes, 15);
        assert!(store.config_of("attio").unwrap().is_enabled);
        assert!(!store.config_of("phantombuster").unwrap().is_enabled);
    }
}
