//! Application wiring.
//!
//! [`AppContext`] assembles the provider registry, resource pools, refresh
//! record store and collaborators from a [`Config`] once at startup. Nothing
//! in it is mutated afterwards.

use std::sync::Arc;

use anyhow::{Context, Result};
use mf_core::config::Config;
use mf_metadata::{
    FanartProvider, FetchOrchestrator, HttpFetcher, ImageSaver, LocalTrailerProvider,
    ProviderRegistry, RefreshRecords, ResourcePools,
};
use tracing::{info, warn};

use crate::http::ReqwestFetcher;
use crate::images::FsImageSaver;
use crate::scanner::FsItemResolver;

pub struct AppContext {
    pub config: Arc<Config>,
    pub orchestrator: FetchOrchestrator,
    pub records: Arc<RefreshRecords>,
}

impl AppContext {
    /// Build with the reqwest-backed HTTP client.
    pub fn build(config: Config) -> Result<Self> {
        let http = Arc::new(ReqwestFetcher::new(&config.http)?);
        Self::build_with_http(config, http)
    }

    /// Build with a caller-supplied HTTP fetcher.
    pub fn build_with_http(config: Config, http: Arc<dyn HttpFetcher>) -> Result<Self> {
        let metadata = Arc::new(config.metadata.clone());

        let images: Arc<dyn ImageSaver> =
            Arc::new(FsImageSaver::new(http.clone(), metadata.cache_dir.clone()));

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(LocalTrailerProvider::new(Arc::new(FsItemResolver))));
        match FanartProvider::from_config(http, images, &metadata.fanart) {
            Some(fanart) => registry.register(Arc::new(fanart)),
            None => info!("No fan-art API key configured; fan-art provider disabled"),
        }

        let mut pools = ResourcePools::from_config(&metadata.pools);
        for provider in registry.ordered() {
            if let Some(pool) = provider.resource_pool() {
                if !pools.contains(pool) {
                    warn!(pool, provider = provider.name(), "No capacity configured for resource pool; using 1");
                    pools = pools.with_pool(pool, 1);
                }
            }
        }

        if let Some(parent) = config.library.state_path.as_deref().and_then(|p| p.parent()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {:?}", parent))?;
        }
        let records = Arc::new(RefreshRecords::new(config.library.state_path.clone()));

        info!(
            providers = registry.len(),
            records = records.len(),
            "Metadata engine ready"
        );

        let orchestrator =
            FetchOrchestrator::new(Arc::new(registry), Arc::new(pools), records.clone(), metadata);

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            records,
        })
    }
}
