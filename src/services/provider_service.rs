//! Provider registry used to resolve hook targets.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::ProviderConfig;

type ProviderMap = HashMap<(String, String), ProviderConfig>;

/// Providers keyed by `(app, provider id)`; swapped atomically on reload.
pub struct ProviderService {
    providers: ArcSwap<ProviderMap>,
}

impl ProviderService {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers: ArcSwap::from_pointee(Self::index(providers)),
        }
    }

    fn index(providers: Vec<ProviderConfig>) -> ProviderMap {
        providers
            .into_iter()
            .map(|p| ((p.app.clone(), p.id.clone()), p))
            .collect()
    }

    /// Replace the whole registry. Readers see either the old or the new set.
    pub fn reload(&self, providers: Vec<ProviderConfig>) {
        let count = providers.len();
        self.providers.store(Arc::new(Self::index(providers)));
        tracing::info!(providers = count, "Provider registry reloaded");
    }

    pub fn get(&self, app: &str, provider_id: &str) -> Option<ProviderConfig> {
        self.providers
            .load()
            .get(&(app.to_string(), provider_id.to_string()))
            .cloned()
    }

    /// All providers, sorted by app then id.
    pub fn list(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> = self.providers.load().values().cloned().collect();
        providers.sort_by(|a, b| (&a.app, &a.id).cmp(&(&b.app, &b.id)));
        providers
    }

    pub fn log_providers(&self) {
        for provider in self.list() {
            tracing::info!(
                app = %provider.app,
                provider = %provider.id,
                api_base = %provider.api_base,
                "Provider registered"
            );
        }
    }
}
