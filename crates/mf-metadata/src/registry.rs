//! Provider registry holding every [`MetadataProvider`] in execution order.
//!
//! Providers are registered once at startup; the registry is then shared
//! immutably behind an `Arc`. Per item, [`ProviderRegistry::applicable_providers`]
//! filters by `supports` and orders by `(priority tier, registration index)`.

use std::sync::Arc;

use mf_core::MediaItem;

use super::provider::MetadataProvider;

/// An append-only registry of metadata providers.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use mf_metadata::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(LocalTrailerProvider::new(resolver)));
/// registry.register(Arc::new(FanartProvider::new(http, images, api_key, template)));
///
/// for provider in registry.applicable_providers(&item) {
///     println!("{} ({})", provider.name(), provider.priority());
/// }
/// ```
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a provider. Registration order breaks ties between providers
    /// of the same priority tier.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Look up a provider by its [`MetadataProvider::name`].
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MetadataProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Every provider in execution order, regardless of item.
    pub fn ordered(&self) -> Vec<Arc<dyn MetadataProvider>> {
        let mut ordered = self.providers.clone();
        // `sort_by_key` is stable, so registration order survives within a tier.
        ordered.sort_by_key(|p| p.priority());
        ordered
    }

    /// Providers that support `item`, in execution order.
    pub fn applicable_providers(&self, item: &MediaItem) -> Vec<Arc<dyn MetadataProvider>> {
        self.ordered()
            .into_iter()
            .filter(|p| p.supports(item))
            .collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
