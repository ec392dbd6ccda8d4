//! Registry of metrics providers keyed by id.

use std::sync::Arc;

use log::info;

use crate::errors::RegistryError;
use crate::provider::MetricsProvider;

/// Holds the set of providers the orchestrator may fetch from.
///
/// Providers are kept in registration order, which is the order
/// [`ProviderRegistry::get_all`] and every batch operation use.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetricsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Fails if its id is already taken.
    pub fn register(&mut self, provider: Arc<dyn MetricsProvider>) -> Result<(), RegistryError> {
        let id = provider.id();
        if self.has(id) {
            return Err(RegistryError::DuplicateProvider(id.to_string()));
        }

        info!("Registered metrics provider '{}' ({})", id, provider.name());
        self.providers.push(provider);
        Ok(())
    }

    /// Register several providers. Either all are registered or, on a
    /// duplicate id, none are and the registry is left unchanged.
    pub fn register_all(
        &mut self,
        providers: impl IntoIterator<Item = Arc<dyn MetricsProvider>>,
    ) -> Result<(), RegistryError> {
        let providers: Vec<_> = providers.into_iter().collect();

        let mut taken = self.ids();
        for provider in &providers {
            let id = provider.id();
            if taken.contains(&id) {
                return Err(RegistryError::DuplicateProvider(id.to_string()));
            }
            taken.push(id);
        }

        for provider in providers {
            self.register(provider)?;
        }
        Ok(())
    }

    /// Build a registry holding exactly `providers`.
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn MetricsProvider>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register_all(providers)?;
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn MetricsProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn get_all(&self) -> Vec<Arc<dyn MetricsProvider>> {
        self.providers.clone()
    }

    pub fn has(&self, id: &str) -> bool {
        self.providers.iter().any(|p| p.id() == id)
    }

    pub fn count(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn clear(&mut self) {
        self.providers.clear();
    }
}
