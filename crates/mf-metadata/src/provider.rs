//! Trait definition and types for metadata providers.
//!
//! This module defines the [`MetadataProvider`] trait that every enrichment
//! source (local trailer discovery, fan-art lookup, etc.) implements, along
//! with the [`ItemUpdate`] a successful fetch returns and the
//! [`ProviderError`] taxonomy a failed one reports.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mf_core::config::MetadataConfig;
use mf_core::{ExternalService, ImageType, MediaItem, TrailerRef};
use tokio_util::sync::CancellationToken;

use crate::collaborators::StoredImage;
use crate::refresh::RefreshRecord;

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Coarse execution bucket. Lower tiers run first within one item's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderPriority {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

impl fmt::Display for ProviderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
            Self::Third => write!(f, "third"),
            Self::Fourth => write!(f, "fourth"),
            Self::Last => write!(f, "last"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a single provider invocation.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A remote call failed. Scoped to this invocation.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A local read or write failed. Scoped to this invocation.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A cancellation checkpoint fired.
    #[error("cancelled")]
    Cancelled,

    /// A programming error. Propagates out of the item pipeline.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl From<mf_core::Error> for ProviderError {
    fn from(err: mf_core::Error) -> Self {
        match err {
            mf_core::Error::Cancelled => ProviderError::Cancelled,
            mf_core::Error::Io { source } => ProviderError::Io(source),
            e @ (mf_core::Error::Transport { .. } | mf_core::Error::Parse(_)) => {
                ProviderError::Transport(e.to_string())
            }
            other => ProviderError::Unexpected(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Item updates
// ---------------------------------------------------------------------------

/// A field of [`MediaItem`] changed by a committed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangedField {
    Image(ImageType),
    LocalTrailers,
    ProviderId(ExternalService),
}

/// The complete set of changes produced by one provider invocation.
///
/// Providers never touch the item directly; the orchestrator applies the
/// update in one step once the invocation has succeeded and no cancellation
/// was requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    images: BTreeMap<ImageType, PathBuf>,
    local_trailers: Option<Vec<TrailerRef>>,
    provider_ids: BTreeMap<ExternalService, String>,
    /// `(staged, final)` artwork files moved into place on commit.
    staged: Vec<(PathBuf, PathBuf)>,
}

impl ItemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_image(&mut self, image_type: ImageType, path: PathBuf) {
        self.images.insert(image_type, path);
    }

    /// Point `image_type` at saved artwork whose bytes may still be staged.
    pub fn stage_image(&mut self, image_type: ImageType, image: StoredImage) {
        if let Some(staged) = image.staged {
            self.staged.push((staged, image.path.clone()));
        }
        self.images.insert(image_type, image.path);
    }

    /// Move staged artwork to its final paths. Files not yet moved when a
    /// rename fails are removed.
    pub async fn promote_staged(&mut self) -> std::io::Result<()> {
        let mut staged = std::mem::take(&mut self.staged).into_iter();
        while let Some((from, to)) = staged.next() {
            if let Err(e) = tokio::fs::rename(&from, &to).await {
                self.staged = std::iter::once((from, to)).chain(staged).collect();
                self.discard_staged().await;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove staged artwork of an update that will not be applied.
    pub async fn discard_staged(&mut self) {
        for (staged, _) in std::mem::take(&mut self.staged) {
            if let Err(e) = tokio::fs::remove_file(&staged).await {
                tracing::debug!(path = %staged.display(), error = %e, "Failed to remove staged artwork");
            }
        }
    }

    /// Replace the item's trailer collection wholesale.
    pub fn set_local_trailers(&mut self, trailers: Vec<TrailerRef>) {
        self.local_trailers = Some(trailers);
    }

    pub fn set_provider_id(&mut self, service: ExternalService, id: impl Into<String>) {
        self.provider_ids.insert(service, id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.local_trailers.is_none() && self.provider_ids.is_empty()
    }

    /// Apply every change to `item`, returning the fields whose value changed.
    pub fn apply_to(self, item: &mut MediaItem) -> Vec<ChangedField> {
        let mut changed = Vec::new();

        for (image_type, path) in self.images {
            if item.images.get(&image_type) != Some(&path) {
                item.images.insert(image_type, path);
                changed.push(ChangedField::Image(image_type));
            }
        }

        if let Some(trailers) = self.local_trailers {
            if item.local_trailers != trailers {
                item.local_trailers = trailers;
                changed.push(ChangedField::LocalTrailers);
            }
        }

        for (service, id) in self.provider_ids {
            if item.provider_ids.get(&service) != Some(&id) {
                item.provider_ids.insert(service, id);
                changed.push(ChangedField::ProviderId(service));
            }
        }

        changed
    }
}

// ---------------------------------------------------------------------------
// Fetch context
// ---------------------------------------------------------------------------

/// Per-invocation context handed to [`MetadataProvider::fetch`].
pub struct FetchContext<'a> {
    pub config: &'a MetadataConfig,
    pub cancellation: &'a CancellationToken,
    /// Pool held by the orchestrator for this invocation, if any.
    pub pool: Option<&'a str>,
}

impl FetchContext<'_> {
    /// Cancellation checkpoint. Call before and after every network operation.
    pub fn checkpoint(&self) -> Result<(), ProviderError> {
        if self.cancellation.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Async trait that all metadata providers implement.
///
/// Providers are immutable once registered and keep no per-item state between
/// runs. They are shared across item pipelines behind an `Arc`.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier used for refresh records and logs.
    fn name(&self) -> &'static str;

    fn priority(&self) -> ProviderPriority;

    /// Bumped whenever the provider's output changes shape; a record written
    /// by another version is treated as stale.
    fn version(&self) -> u32 {
        1
    }

    /// Resource pool the orchestrator must hold while `fetch` runs.
    fn resource_pool(&self) -> Option<&'static str> {
        None
    }

    /// Whether this provider applies to `item` at all.
    fn supports(&self, item: &MediaItem) -> bool;

    /// Whether the provider should run now. `last` is `None` when the item was
    /// never fetched by this provider (or a forced refresh was requested).
    fn needs_refresh(
        &self,
        item: &MediaItem,
        last: Option<&RefreshRecord>,
        config: &MetadataConfig,
        now: DateTime<Utc>,
    ) -> bool;

    /// Produce the changes for `item`. Must not mutate shared state that
    /// outlives a discarded result, other than downloaded files.
    async fn fetch(
        &self,
        item: &MediaItem,
        ctx: &FetchContext<'_>,
    ) -> Result<ItemUpdate, ProviderError>;
}
