//! Per-item provider pipeline.
//!
//! [`FetchOrchestrator::refresh_item`] walks the registry in priority order
//! and drives every provider through the same lifecycle:
//!
//! ```text
//! Pending -> SkippedUnsupported
//!         -> SkippedNotNeeded
//!         -> AwaitingPool -> Fetching -> Commit
//!                                     -> Discard (transport / I/O failure, cancellation)
//! ```
//!
//! Commit moves staged artwork into place, advances the refresh record and
//! applies the update to the item. Discard removes staged artwork.
//!
//! Providers of one item run sequentially so later providers observe fields
//! committed by earlier ones. Many items run concurrently through
//! [`FetchOrchestrator::refresh_library`]; the only state shared between them
//! is the resource pools and the refresh record store.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use mf_core::config::MetadataConfig;
use mf_core::{Error, ItemId, MediaItem, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::pool::ResourcePools;
use crate::provider::{ChangedField, FetchContext, MetadataProvider, ProviderError};
use crate::refresh::{should_refresh, RefreshStore};
use crate::registry::ProviderRegistry;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Caller-supplied options for one refresh run.
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Ignore refresh records. Configuration checks still apply.
    pub force: bool,
    pub cancellation: CancellationToken,
}

/// Terminal state of one provider invocation for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded(Vec<ChangedField>),
    SkippedNotNeeded,
    SkippedUnsupported,
    FailedTransient(String),
    Cancelled,
}

impl FetchOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::SkippedNotNeeded | Self::SkippedUnsupported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRun {
    pub provider: &'static str,
    pub outcome: FetchOutcome,
}

/// Outcomes for every provider visited while refreshing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRefreshReport {
    pub item_id: ItemId,
    pub runs: Vec<ProviderRun>,
}

impl ItemRefreshReport {
    pub fn cancelled(&self) -> bool {
        self.runs.iter().any(|r| r.outcome == FetchOutcome::Cancelled)
    }

    pub fn outcome_for(&self, provider: &str) -> Option<&FetchOutcome> {
        self.runs
            .iter()
            .find(|r| r.provider == provider)
            .map(|r| &r.outcome)
    }
}

/// Aggregate counts for a library-wide run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub items: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled_items: usize,
    /// Items whose pipeline stopped on an unexpected error.
    pub errored_items: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &ItemRefreshReport) {
        for run in &report.runs {
            match run.outcome {
                FetchOutcome::Succeeded(_) => self.succeeded += 1,
                FetchOutcome::SkippedNotNeeded | FetchOutcome::SkippedUnsupported => {
                    self.skipped += 1
                }
                FetchOutcome::FailedTransient(_) => self.failed += 1,
                FetchOutcome::Cancelled => {}
            }
        }
        if report.cancelled() {
            self.cancelled_items += 1;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items: {} succeeded, {} skipped, {} failed, {} cancelled, {} errored",
            self.items,
            self.succeeded,
            self.skipped,
            self.failed,
            self.cancelled_items,
            self.errored_items
        )
    }
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Marks an item as being refreshed; removed again on drop.
struct InFlightGuard<'a> {
    set: &'a DashSet<ItemId>,
    id: ItemId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a DashSet<ItemId>, id: ItemId) -> Result<Self> {
        if !set.insert(id) {
            return Err(Error::Conflict(format!("item {id} is already being refreshed")));
        }
        Ok(Self { set, id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct FetchOrchestrator {
    registry: Arc<ProviderRegistry>,
    pools: Arc<ResourcePools>,
    records: Arc<dyn RefreshStore>,
    config: Arc<MetadataConfig>,
    in_flight: DashSet<ItemId>,
}

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        pools: Arc<ResourcePools>,
        records: Arc<dyn RefreshStore>,
        config: Arc<MetadataConfig>,
    ) -> Self {
        Self {
            registry,
            pools,
            records,
            config,
            in_flight: DashSet::new(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn pools(&self) -> &ResourcePools {
        &self.pools
    }

    /// Run every registered provider against `item`.
    ///
    /// Transport and I/O failures are scoped to the failing provider and the
    /// pipeline moves on. Cancellation stops the remaining providers for this
    /// item. An unexpected provider error stops the pipeline and is returned.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] when `item` is already being refreshed, and
    /// [`Error::Internal`] for unexpected provider failures.
    pub async fn refresh_item(
        &self,
        item: &mut MediaItem,
        options: &RefreshOptions,
    ) -> Result<ItemRefreshReport> {
        let _guard = InFlightGuard::acquire(&self.in_flight, item.id)?;

        debug!(item_id = %item.id, name = %item.name, force = options.force, "Refreshing item");

        let mut report = ItemRefreshReport {
            item_id: item.id,
            runs: Vec::new(),
        };

        let applicable = self.registry.applicable_providers(item);
        for provider in self.registry.ordered() {
            let outcome = if options.cancellation.is_cancelled() {
                FetchOutcome::Cancelled
            } else if !applicable.iter().any(|p| Arc::ptr_eq(p, &provider)) {
                FetchOutcome::SkippedUnsupported
            } else {
                self.run_provider(provider.as_ref(), item, options).await?
            };

            let stop = outcome == FetchOutcome::Cancelled;
            report.runs.push(ProviderRun {
                provider: provider.name(),
                outcome,
            });
            if stop {
                info!(item_id = %item.id, provider = provider.name(), "Refresh cancelled");
                break;
            }
        }

        Ok(report)
    }

    async fn run_provider(
        &self,
        provider: &dyn MetadataProvider,
        item: &mut MediaItem,
        options: &RefreshOptions,
    ) -> Result<FetchOutcome> {
        let name = provider.name();
        let last = self.records.last_refreshed(item.id, name);

        if !should_refresh(provider, item, last.as_ref(), &self.config, Utc::now(), options.force) {
            debug!(item_id = %item.id, provider = name, "Refresh not needed");
            return Ok(FetchOutcome::SkippedNotNeeded);
        }

        let permit = match provider.resource_pool() {
            Some(pool) => match self.pools.acquire(pool, &options.cancellation).await {
                Ok(permit) => Some(permit),
                Err(Error::Cancelled) => return Ok(FetchOutcome::Cancelled),
                Err(e) => return Err(e),
            },
            None => None,
        };

        let result = {
            let ctx = FetchContext {
                config: &self.config,
                cancellation: &options.cancellation,
                pool: permit.as_ref().map(|p| p.pool()),
            };
            match ctx.checkpoint() {
                Ok(()) => provider.fetch(item, &ctx).await,
                Err(e) => Err(e),
            }
        };
        drop(permit);

        let mut update = match result {
            Ok(update) => update,
            Err(ProviderError::Cancelled) => return Ok(FetchOutcome::Cancelled),
            Err(e @ (ProviderError::Transport(_) | ProviderError::Io(_))) => {
                warn!(item_id = %item.id, provider = name, error = %e, "Provider failed; keeping previous state");
                return Ok(FetchOutcome::FailedTransient(e.to_string()));
            }
            Err(ProviderError::Unexpected(message)) => {
                error!(item_id = %item.id, provider = name, error = %message, "Provider raised an unexpected error");
                return Err(Error::Internal(format!("provider '{name}': {message}")));
            }
        };

        // Past the last checkpoint: the result is dropped without touching the item.
        if options.cancellation.is_cancelled() {
            debug!(item_id = %item.id, provider = name, "Discarding result of cancelled fetch");
            update.discard_staged().await;
            return Ok(FetchOutcome::Cancelled);
        }

        if let Err(e) = update.promote_staged().await {
            warn!(item_id = %item.id, provider = name, error = %e, "Failed to move artwork into place; discarding result");
            return Ok(FetchOutcome::FailedTransient(e.to_string()));
        }

        if let Err(e) = self.commit_record(item.id, name, provider.version()).await {
            warn!(item_id = %item.id, provider = name, error = %e, "Failed to record refresh; discarding result");
            return Ok(FetchOutcome::FailedTransient(e.to_string()));
        }

        let changed = update.apply_to(item);
        info!(item_id = %item.id, provider = name, changed = changed.len(), "Committed provider result");
        Ok(FetchOutcome::Succeeded(changed))
    }

    /// Write the refresh record on the blocking pool; the store may rewrite
    /// its backing file.
    async fn commit_record(&self, item_id: ItemId, provider: &'static str, version: u32) -> Result<()> {
        let records = self.records.clone();
        tokio::task::spawn_blocking(move || {
            records.set_last_refreshed(item_id, provider, version, Utc::now())
        })
        .await
        .map_err(|e| Error::Internal(format!("refresh record writer failed: {e}")))??;
        Ok(())
    }

    /// Refresh many items, at most `concurrency` at a time.
    ///
    /// Returns the items (sorted by path) together with aggregate counts. An
    /// item whose pipeline errors or panics is still returned, with whatever
    /// was committed before the failure, and the other items carry on.
    pub async fn refresh_library(
        &self,
        items: Vec<MediaItem>,
        concurrency: usize,
        options: &RefreshOptions,
    ) -> (Vec<MediaItem>, RunSummary) {
        let results: Vec<(MediaItem, Result<ItemRefreshReport>)> =
            stream::iter(items.into_iter().map(|mut item| async move {
                // Commits are whole-field assignments, so an item observed
                // after a panic holds only committed state.
                let result = AssertUnwindSafe(self.refresh_item(&mut item, options))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(Error::Internal(format!(
                            "item pipeline panicked: {}",
                            panic_message(panic.as_ref())
                        )))
                    });
                (item, result)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summary = RunSummary::default();
        let mut refreshed = Vec::with_capacity(results.len());
        for (item, result) in results {
            match result {
                Ok(report) => summary.record(&report),
                Err(e) => {
                    error!(item_id = %item.id, name = %item.name, error = %e, "Item refresh failed");
                    summary.errored_items += 1;
                }
            }
            refreshed.push(item);
        }
        summary.items = refreshed.len();
        refreshed.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            items = summary.items,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled_items,
            errored = summary.errored_items,
            "Library refresh finished"
        );

        (refreshed, summary)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
