//! Local trailer discovery.
//!
//! Looks for a `trailers` subdirectory next to the item. Every entry in it
//! is resolved through the [`ItemResolver`]; entries that resolve to video
//! become the item's trailer collection, replacing whatever was stored
//! before.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mf_core::config::MetadataConfig;
use mf_core::{ItemKind, MediaItem, TrailerRef};
use tracing::debug;

use crate::collaborators::ItemResolver;
use crate::provider::{FetchContext, ItemUpdate, MetadataProvider, ProviderError, ProviderPriority};
use crate::refresh::RefreshRecord;

/// Well-known subdirectory holding an item's trailers.
pub const TRAILERS_DIR: &str = "trailers";

pub struct LocalTrailerProvider {
    resolver: Arc<dyn ItemResolver>,
}

impl LocalTrailerProvider {
    pub fn new(resolver: Arc<dyn ItemResolver>) -> Self {
        Self { resolver }
    }

    fn trailers_dir(item: &MediaItem) -> Option<&Path> {
        item.resolve_args
            .entry_by_name(TRAILERS_DIR, true)
            .map(|entry| entry.path.as_path())
    }
}

async fn list_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

#[async_trait]
impl MetadataProvider for LocalTrailerProvider {
    fn name(&self) -> &'static str {
        "local_trailers"
    }

    fn priority(&self) -> ProviderPriority {
        ProviderPriority::First
    }

    fn supports(&self, item: &MediaItem) -> bool {
        // Trailers do not carry trailers of their own.
        item.kind != ItemKind::Video
    }

    /// Local discovery is cheap, so it runs whenever the directory exists.
    /// Without the directory the provider is a no-op and writes no record.
    fn needs_refresh(
        &self,
        item: &MediaItem,
        _last: Option<&RefreshRecord>,
        _config: &MetadataConfig,
        _now: DateTime<Utc>,
    ) -> bool {
        Self::trailers_dir(item).is_some()
    }

    async fn fetch(
        &self,
        item: &MediaItem,
        ctx: &FetchContext<'_>,
    ) -> Result<ItemUpdate, ProviderError> {
        ctx.checkpoint()?;

        let Some(dir) = Self::trailers_dir(item) else {
            return Ok(ItemUpdate::new());
        };

        let mut trailers = Vec::new();
        for path in list_entries(dir).await? {
            ctx.checkpoint()?;
            match self.resolver.resolve(&path).await? {
                Some(child) if child.kind.is_video() => trailers.push(TrailerRef {
                    id: child.id,
                    path: child.path,
                }),
                Some(child) => {
                    debug!(path = %path.display(), kind = %child.kind, "Ignoring non-video trailer entry");
                }
                None => {
                    debug!(path = %path.display(), "Ignoring unresolvable trailer entry");
                }
            }
        }

        debug!(item_id = %item.id, count = trailers.len(), "Discovered local trailers");

        let mut update = ItemUpdate::new();
        update.set_local_trailers(trailers);
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ExtensionResolver;
    use assert_matches::assert_matches;
    use mf_core::ResolveArgs;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        provider: LocalTrailerProvider,
        config: MetadataConfig,
    }

    impl Fixture {
        fn new(files: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("Show");
            std::fs::create_dir_all(root.join(TRAILERS_DIR)).unwrap();
            for file in files {
                std::fs::write(root.join(TRAILERS_DIR).join(file), b"x").unwrap();
            }
            Self {
                _dir: dir,
                root,
                provider: LocalTrailerProvider::new(Arc::new(ExtensionResolver)),
                config: MetadataConfig::default(),
            }
        }

        fn item(&self) -> MediaItem {
            MediaItem::new("Show", ItemKind::Series, &self.root)
                .with_resolve_args(ResolveArgs::from_dir(&self.root).unwrap())
        }

        async fn discover(&self, item: &mut MediaItem) -> Vec<PathBuf> {
            let token = CancellationToken::new();
            let ctx = FetchContext { config: &self.config, cancellation: &token, pool: None };
            let update = self.provider.fetch(item, &ctx).await.unwrap();
            update.apply_to(item);
            item.local_trailers.iter().map(|t| t.path.clone()).collect()
        }
    }

    #[tokio::test]
    async fn keeps_only_video_entries() {
        let fx = Fixture::new(&["a.mkv", "b.mp4", "notes.txt"]);
        let mut item = fx.item();
        let found = fx.discover(&mut item).await;
        let trailers = fx.root.join(TRAILERS_DIR);
        assert_eq!(found, vec![trailers.join("a.mkv"), trailers.join("b.mp4")]);
    }

    #[tokio::test]
    async fn rerun_is_idempotent_and_shrinks_after_removal() {
        let fx = Fixture::new(&["a.mkv", "b.mkv"]);
        let mut item = fx.item();

        let first = fx.discover(&mut item).await;
        let second = fx.discover(&mut item).await;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);

        std::fs::remove_file(fx.root.join(TRAILERS_DIR).join("a.mkv")).unwrap();
        let third = fx.discover(&mut item).await;
        assert_eq!(third, vec![fx.root.join(TRAILERS_DIR).join("b.mkv")]);
    }

    #[tokio::test]
    async fn missing_directory_means_no_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let item = MediaItem::new("Show", ItemKind::Series, dir.path())
            .with_resolve_args(ResolveArgs::from_dir(dir.path()).unwrap());
        let provider = LocalTrailerProvider::new(Arc::new(ExtensionResolver));
        assert!(!provider.needs_refresh(&item, None, &MetadataConfig::default(), Utc::now()));
    }

    #[tokio::test]
    async fn directory_present_means_refresh_even_when_recent() {
        let fx = Fixture::new(&[]);
        let record = RefreshRecord::new("local_trailers", 1, Utc::now());
        assert!(fx.provider.needs_refresh(&fx.item(), Some(&record), &fx.config, Utc::now()));
    }

    #[tokio::test]
    async fn trailer_videos_are_not_supported() {
        let provider = LocalTrailerProvider::new(Arc::new(ExtensionResolver));
        let trailer = MediaItem::new("t", ItemKind::Video, "/tv/Show/trailers/t.mkv");
        assert!(!provider.supports(&trailer));
        assert!(provider.supports(&MediaItem::new("m", ItemKind::Movie, "/m/m.mkv")));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let fx = Fixture::new(&["a.mkv"]);
        let item = fx.item();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = FetchContext { config: &fx.config, cancellation: &token, pool: None };
        assert_matches!(fx.provider.fetch(&item, &ctx).await, Err(ProviderError::Cancelled));
    }
}
