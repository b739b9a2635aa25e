//! Interfaces the engine consumes but does not implement.
//!
//! Concrete implementations (reqwest fetcher, filesystem image store,
//! filesystem item resolver) live in the application crate; tests supply
//! in-memory stubs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use mf_core::{MediaItem, Result};
use tokio_util::sync::CancellationToken;

/// Filesystem-to-item resolution.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Resolve `path` to an item, or `None` when nothing there is recognized.
    async fn resolve(&self, path: &Path) -> Result<Option<MediaItem>>;
}

/// A GET request issued by a provider.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    /// Pool already held by the orchestrator for this call; informational.
    pub pool: Option<&'a str>,
    pub cancellation: &'a CancellationToken,
    pub enable_cache: bool,
}

/// Generic HTTP fetch capability.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch the body of `request.url`. Fails with [`mf_core::Error::Transport`]
    /// on network or HTTP failure and [`mf_core::Error::Cancelled`] when the
    /// token fires mid-request.
    async fn get(&self, request: HttpRequest<'_>) -> Result<Bytes>;
}

/// A download-and-store request for one piece of artwork.
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest<'a> {
    pub item: &'a MediaItem,
    pub url: &'a str,
    /// File stem to save under (e.g. `"logo"`).
    pub target_name: &'a str,
    /// Save next to the media instead of the metadata cache.
    pub save_locally: bool,
    pub pool: Option<&'a str>,
    pub cancellation: &'a CancellationToken,
}

/// Artwork written by an [`ImageSaver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Final location, valid once the owning update commits.
    pub path: PathBuf,
    /// Where the bytes wait until commit. `None` when already in place.
    pub staged: Option<PathBuf>,
}

impl StoredImage {
    pub fn in_place(path: PathBuf) -> Self {
        Self { path, staged: None }
    }
}

/// Downloads artwork and stores it.
///
/// Savers should stage the bytes rather than overwrite `path`: a provider
/// invocation may still fail or be cancelled after the download, and only a
/// committed update moves staged files into place.
#[async_trait]
pub trait ImageSaver: Send + Sync {
    async fn download_and_save(&self, request: ImageRequest<'_>) -> Result<StoredImage>;
}
