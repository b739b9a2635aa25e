//! mf-metadata: the metadata provider orchestration engine.
//!
//! For one media item the [`FetchOrchestrator`] walks the applicable
//! providers from the [`ProviderRegistry`] in priority order, asks the
//! refresh policy whether each one needs to run, acquires the provider's
//! [`ResourcePools`] slot, invokes the fetch, and commits or discards the
//! result.
//!
//! # Module layout
//!
//! - [`provider`] -- Trait definition, priorities, errors, and item updates.
//! - [`registry`] -- Ordered, append-only provider registry.
//! - [`refresh`] -- Refresh decisions and the refresh record store.
//! - [`pool`] -- Named bounded-concurrency gates for external hosts.
//! - [`fallback`] -- Ordered first-non-empty extraction chains.
//! - [`collaborators`] -- Interfaces for HTTP, image saving, and item resolution.
//! - [`orchestrator`] -- The per-item and library-wide pipelines.
//! - [`providers`] -- Concrete providers (local trailers, fan-art).

pub mod collaborators;
pub mod fallback;
pub mod orchestrator;
pub mod pool;
pub mod provider;
pub mod providers;
pub mod refresh;
pub mod registry;

pub use collaborators::{
    HttpFetcher, HttpRequest, ImageRequest, ImageSaver, ItemResolver, StoredImage,
};
pub use fallback::{FallbackChain, Resolved};
pub use orchestrator::{
    FetchOrchestrator, FetchOutcome, ItemRefreshReport, ProviderRun, RefreshOptions, RunSummary,
};
pub use pool::{PoolPermit, ResourcePools};
pub use provider::{
    ChangedField, FetchContext, ItemUpdate, MetadataProvider, ProviderError, ProviderPriority,
};
pub use providers::{FanartProvider, LocalTrailerProvider};
pub use refresh::{RefreshRecord, RefreshRecords, RefreshStore};
pub use registry::ProviderRegistry;

#[cfg(test)]
pub(crate) mod test_support;
