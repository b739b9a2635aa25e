//! In-memory collaborators and a scriptable provider shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mf_core::config::MetadataConfig;
use mf_core::paths::is_video_file;
use mf_core::{Error, ItemKind, MediaItem, Result};
use parking_lot::Mutex;

use crate::collaborators::{
    HttpFetcher, HttpRequest, ImageRequest, ImageSaver, ItemResolver, StoredImage,
};
use crate::provider::{FetchContext, ItemUpdate, MetadataProvider, ProviderError, ProviderPriority};
use crate::refresh::{self, RefreshRecord};

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;
pub type IntervalLog = Arc<Mutex<Vec<(Instant, Instant)>>>;

/// What a [`StubProvider`] does when fetched.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    Succeed(ItemUpdate),
    FailTransport,
    FailIo,
    Unexpected,
    /// Fires the run's cancellation token mid-fetch, then reports success.
    CancelDuring(ItemUpdate),
    /// Panics for the item with this name, succeeds for every other item.
    PanicOn(&'static str),
}

pub struct StubProvider {
    name: &'static str,
    priority: ProviderPriority,
    supported: bool,
    needed: bool,
    pool: Option<&'static str>,
    delay: Option<Duration>,
    behavior: StubBehavior,
    calls: CallLog,
    intervals: IntervalLog,
}

impl StubProvider {
    pub fn new(name: &'static str, priority: ProviderPriority) -> Self {
        Self {
            name,
            priority,
            supported: true,
            needed: true,
            pool: None,
            delay: None,
            behavior: StubBehavior::Succeed(ItemUpdate::new()),
            calls: CallLog::default(),
            intervals: IntervalLog::default(),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn not_needed(mut self) -> Self {
        self.needed = false;
        self
    }

    pub fn with_pool(mut self, pool: &'static str) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_behavior(mut self, behavior: StubBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_calls(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn with_intervals(mut self, intervals: IntervalLog) -> Self {
        self.intervals = intervals;
        self
    }
}

#[async_trait]
impl MetadataProvider for StubProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> ProviderPriority {
        self.priority
    }

    fn resource_pool(&self) -> Option<&'static str> {
        self.pool
    }

    fn supports(&self, _item: &MediaItem) -> bool {
        self.supported
    }

    fn needs_refresh(
        &self,
        _item: &MediaItem,
        last: Option<&RefreshRecord>,
        config: &MetadataConfig,
        now: DateTime<Utc>,
    ) -> bool {
        self.needed && refresh::is_stale(last, self.version(), config.staleness_window(), now)
    }

    async fn fetch(
        &self,
        item: &MediaItem,
        ctx: &FetchContext<'_>,
    ) -> std::result::Result<ItemUpdate, ProviderError> {
        self.calls.lock().push(self.name);
        let started = Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.intervals.lock().push((started, Instant::now()));

        match &self.behavior {
            StubBehavior::Succeed(update) => Ok(update.clone()),
            StubBehavior::FailTransport => Err(ProviderError::Transport("host unreachable".into())),
            StubBehavior::FailIo => Err(ProviderError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            ))),
            StubBehavior::Unexpected => Err(ProviderError::Unexpected("invariant broken".into())),
            StubBehavior::CancelDuring(update) => {
                ctx.cancellation.cancel();
                Ok(update.clone())
            }
            StubBehavior::PanicOn(name) if item.name == *name => {
                panic!("stub provider crashed on {name}")
            }
            StubBehavior::PanicOn(_) => Ok(ItemUpdate::new()),
        }
    }
}

/// Resolves directories to folders and video files to videos.
pub struct ExtensionResolver;

#[async_trait]
impl ItemResolver for ExtensionResolver {
    async fn resolve(&self, path: &Path) -> Result<Option<MediaItem>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if path.is_dir() {
            Ok(Some(MediaItem::new(name, ItemKind::Folder, path)))
        } else if is_video_file(path) {
            Ok(Some(MediaItem::new(name, ItemKind::Video, path)))
        } else {
            Ok(None)
        }
    }
}

/// Serves one canned body (or failure) and counts requests.
pub struct StubHttp {
    body: Option<Bytes>,
    requests: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl StubHttp {
    pub fn serving(body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            requests: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: None,
            requests: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl HttpFetcher for StubHttp {
    async fn get(&self, request: HttpRequest<'_>) -> Result<Bytes> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(request.url.to_string());
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => Err(Error::transport(request.url, "connection refused")),
        }
    }
}

/// Pretends to store artwork under `/cache/<item id>/<target>.jpg`, or stages
/// real files in a directory when built with [`StubImages::staging_in`].
#[derive(Default)]
pub struct StubImages {
    fail: bool,
    fail_on: Option<&'static str>,
    stage_dir: Option<PathBuf>,
    saved: Mutex<Vec<(String, String)>>,
}

impl StubImages {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Write each download to `<dir>/.<target>.jpg.staged`, with the URL as
    /// its content, for `<dir>/<target>.jpg`.
    pub fn staging_in(dir: impl Into<PathBuf>) -> Self {
        Self {
            stage_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Fail downloads for `target_name` only.
    pub fn failing_on(mut self, target_name: &'static str) -> Self {
        self.fail_on = Some(target_name);
        self
    }

    /// `(target_name, url)` of every successful save, in call order.
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl ImageSaver for StubImages {
    async fn download_and_save(&self, request: ImageRequest<'_>) -> Result<StoredImage> {
        if self.fail || self.fail_on == Some(request.target_name) {
            return Err(Error::transport(request.url, "status 503"));
        }
        self.saved
            .lock()
            .push((request.target_name.to_string(), request.url.to_string()));

        let file_name = format!("{}.jpg", request.target_name);
        match &self.stage_dir {
            Some(dir) => {
                let staged = dir.join(format!(".{file_name}.staged"));
                tokio::fs::write(&staged, request.url).await?;
                Ok(StoredImage {
                    path: dir.join(file_name),
                    staged: Some(staged),
                })
            }
            None => Ok(StoredImage::in_place(
                PathBuf::from("/cache")
                    .join(request.item.id.to_string())
                    .join(file_name),
            )),
        }
    }
}
