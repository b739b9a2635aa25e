//! Filesystem artwork store.
//!
//! [`FsImageSaver`] downloads artwork through the shared [`HttpFetcher`] and
//! writes it either next to the media (`<meta dir>/<target>.<ext>`) or into
//! the metadata cache (`<cache dir>/<item id>/<target>.<ext>`). Bytes land in
//! a hidden staging file beside the target; the refresh pipeline renames it
//! into place only when the provider's result is committed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mf_core::paths::is_image_file;
use mf_core::{Error, MediaItem};
use mf_metadata::{HttpFetcher, HttpRequest, ImageRequest, ImageSaver, StoredImage};
use tracing::debug;

const DEFAULT_EXTENSION: &str = "jpg";

/// Image extension taken from the last path segment of `url`.
fn extension_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    let path = Path::new(segment);
    if is_image_file(path) {
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_EXTENSION.into())
    } else {
        DEFAULT_EXTENSION.into()
    }
}

/// Hidden sibling of `path` holding bytes that are not committed yet.
fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.staged"))
}

pub struct FsImageSaver {
    http: Arc<dyn HttpFetcher>,
    cache_dir: PathBuf,
}

impl FsImageSaver {
    pub fn new(http: Arc<dyn HttpFetcher>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            cache_dir: cache_dir.into(),
        }
    }

    /// Where artwork for `item` named `target_name` is stored.
    pub fn target_path(
        &self,
        item: &MediaItem,
        target_name: &str,
        url: &str,
        save_locally: bool,
    ) -> PathBuf {
        let file_name = format!("{target_name}.{}", extension_from_url(url));
        if save_locally {
            item.meta_dir().join(file_name)
        } else {
            self.cache_dir.join(item.id.to_string()).join(file_name)
        }
    }
}

#[async_trait]
impl ImageSaver for FsImageSaver {
    async fn download_and_save(&self, request: ImageRequest<'_>) -> mf_core::Result<StoredImage> {
        let data = self
            .http
            .get(HttpRequest {
                url: request.url,
                pool: request.pool,
                cancellation: request.cancellation,
                enable_cache: false,
            })
            .await?;

        if request.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let path = self.target_path(request.item, request.target_name, request.url, request.save_locally);
        let parent = path
            .parent()
            .ok_or_else(|| Error::Internal(format!("image path has no parent: {}", path.display())))?;
        tokio::fs::create_dir_all(parent).await?;

        let staged = staging_path(&path);
        if let Err(e) = tokio::fs::write(&staged, &data).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e.into());
        }

        debug!(
            item_id = %request.item.id,
            target_name = request.target_name,
            path = %path.display(),
            bytes = data.len(),
            "Staged image"
        );
        Ok(StoredImage {
            path,
            staged: Some(staged),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use mf_core::{ImageType, ItemKind};
    use mf_metadata::ItemUpdate;
    use tokio_util::sync::CancellationToken;

    struct StaticFetcher(Option<&'static [u8]>);

    #[async_trait]
    impl HttpFetcher for StaticFetcher {
        async fn get(&self, request: HttpRequest<'_>) -> mf_core::Result<Bytes> {
            match self.0 {
                Some(body) => Ok(Bytes::from_static(body)),
                None => Err(Error::transport(request.url, "status 404")),
            }
        }
    }

    fn request<'a>(
        item: &'a MediaItem,
        url: &'a str,
        save_locally: bool,
        token: &'a CancellationToken,
    ) -> ImageRequest<'a> {
        ImageRequest {
            item,
            url,
            target_name: "logo",
            save_locally,
            pool: Some("fanart"),
            cancellation: token,
        }
    }

    #[test]
    fn extension_detection() {
        assert_eq!(extension_from_url("http://a/b/logo.PNG"), "png");
        assert_eq!(extension_from_url("http://a/b/logo.png?x=1"), "png");
        assert_eq!(extension_from_url("http://a/b/logo"), "jpg");
        assert_eq!(extension_from_url("http://a.example/"), "jpg");
    }

    #[tokio::test]
    async fn saves_into_cache_dir_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FsImageSaver::new(Arc::new(StaticFetcher(Some(b"png-bytes"))), dir.path());
        let item = MediaItem::new("Show", ItemKind::Series, dir.path().join("Show"));
        let token = CancellationToken::new();

        let stored = saver
            .download_and_save(request(&item, "http://x/a.png", false, &token))
            .await
            .unwrap();

        let path = dir.path().join(item.id.to_string()).join("logo.png");
        assert_eq!(stored.path, path);
        assert_eq!(stored.staged.as_deref(), Some(staging_path(&path).as_path()));
        assert_eq!(std::fs::read(stored.staged.unwrap()).unwrap(), b"png-bytes");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn existing_artwork_is_replaced_only_on_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FsImageSaver::new(Arc::new(StaticFetcher(Some(b"new"))), dir.path());
        let item = MediaItem::new("Show", ItemKind::Series, dir.path().join("Show"));
        let token = CancellationToken::new();
        let target = dir.path().join(item.id.to_string()).join("logo.png");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"old").unwrap();

        // A result that is never committed leaves the current file alone.
        let mut discarded = ItemUpdate::new();
        discarded.stage_image(
            ImageType::Logo,
            saver
                .download_and_save(request(&item, "http://x/a.png", false, &token))
                .await
                .unwrap(),
        );
        discarded.discard_staged().await;
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert!(!staging_path(&target).exists());

        let mut committed = ItemUpdate::new();
        committed.stage_image(
            ImageType::Logo,
            saver
                .download_and_save(request(&item, "http://x/a.png", false, &token))
                .await
                .unwrap(),
        );
        committed.promote_staged().await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!staging_path(&target).exists());
    }

    #[tokio::test]
    async fn saves_next_to_media_when_local() {
        let dir = tempfile::tempdir().unwrap();
        let show = dir.path().join("Show");
        std::fs::create_dir_all(&show).unwrap();
        let saver = FsImageSaver::new(Arc::new(StaticFetcher(Some(b"jpg"))), dir.path().join("cache"));
        let item = MediaItem::new("Show", ItemKind::Series, &show);
        let token = CancellationToken::new();

        let stored = saver
            .download_and_save(request(&item, "http://x/a", true, &token))
            .await
            .unwrap();

        assert_eq!(stored.path, show.join("logo.jpg"));
        assert_eq!(stored.staged, Some(show.join(".logo.jpg.staged")));
        assert!(!dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn failed_download_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let saver = FsImageSaver::new(Arc::new(StaticFetcher(None)), dir.path());
        let item = MediaItem::new("Show", ItemKind::Series, dir.path().join("Show"));
        let token = CancellationToken::new();

        let err = saver
            .download_and_save(request(&item, "http://x/a.png", false, &token))
            .await
            .unwrap_err();

        assert_matches!(err, Error::Transport { .. });
        assert!(!dir.path().join(item.id.to_string()).exists());
    }
}
