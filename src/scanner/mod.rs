//! Media library scanner.
//!
//! Turns library roots into [`MediaItem`]s for the refresh pipeline. Every
//! top-level directory under a root is a series, every top-level video file a
//! movie. Series folders may carry their TVDB id in the name, e.g.
//! `Show Name (2010) [tvdbid-12345]`. A root-level `trailers` directory holds
//! extras, not a series, and is skipped.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use mf_core::paths::is_video_file;
use mf_core::{ExternalService, ItemKind, MediaItem, ResolveArgs};
use mf_metadata::providers::local_trailers::TRAILERS_DIR;
use mf_metadata::ItemResolver;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static TVDB_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\[{]\s*tvdb(?:id)?\s*[-=]\s*(\d+)\s*[\]}]").expect("valid tvdb tag pattern")
});

/// Extract the TVDB id from a folder name tag.
pub fn parse_tvdb_id(name: &str) -> Option<String> {
    TVDB_TAG
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Folder name with any id tag removed.
pub fn display_name(name: &str) -> String {
    TVDB_TAG.replace_all(name, "").trim().to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build a series item for `dir`, capturing its directory listing.
pub fn series_item(dir: &Path) -> Result<MediaItem> {
    let name = file_name(dir);
    let mut item = MediaItem::new(display_name(&name), ItemKind::Series, dir)
        .with_resolve_args(ResolveArgs::from_dir(dir)?);
    if let Some(id) = parse_tvdb_id(&name) {
        item = item.with_provider_id(ExternalService::Tvdb, id);
    }
    Ok(item)
}

/// Build a movie item for a loose video file.
///
/// Loose files share the root folder with every other movie, so the item gets
/// no directory snapshot and claims none of the root's subdirectories.
pub fn movie_item(file: &Path) -> MediaItem {
    let stem = file
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    MediaItem::new(stem, ItemKind::Movie, file)
}

/// Discover items in every root. Missing roots are logged and skipped.
pub fn scan_library(roots: &[PathBuf]) -> Result<Vec<MediaItem>> {
    let mut items = Vec::new();

    for root in roots {
        if !root.is_dir() {
            warn!("Library path does not exist: {:?}", root);
            continue;
        }

        info!("Scanning directory: {:?}", root);
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if file_name(path).eq_ignore_ascii_case(TRAILERS_DIR) {
                    debug!("Skipping extras directory: {:?}", path);
                    continue;
                }
                items.push(series_item(path)?);
            } else if is_video_file(path) {
                items.push(movie_item(path));
            } else {
                debug!("Skipping non-media entry: {:?}", path);
            }
        }
    }

    info!(count = items.len(), "Library scan complete");
    Ok(items)
}

/// Resolves filesystem paths to items: directories become folders and video
/// files become videos.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsItemResolver;

#[async_trait]
impl ItemResolver for FsItemResolver {
    async fn resolve(&self, path: &Path) -> mf_core::Result<Option<MediaItem>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let name = file_name(path);
        if metadata.is_dir() {
            Ok(Some(MediaItem::new(name, ItemKind::Folder, path)))
        } else if is_video_file(path) {
            Ok(Some(MediaItem::new(name, ItemKind::Video, path)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tvdb_tags() {
        assert_eq!(parse_tvdb_id("Show (2010) [tvdbid-12345]"), Some("12345".into()));
        assert_eq!(parse_tvdb_id("Show {tvdb-77}"), Some("77".into()));
        assert_eq!(parse_tvdb_id("Show [TVDBID=9]"), Some("9".into()));
        assert_eq!(parse_tvdb_id("Show (2010)"), None);
        assert_eq!(display_name("Show (2010) [tvdbid-12345]"), "Show (2010)");
    }

    #[test]
    fn scans_series_and_movies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("Show [tvdbid-12345]").join("trailers")).unwrap();
        std::fs::create_dir_all(root.join("Untagged")).unwrap();
        std::fs::write(root.join("Film (1999).mkv"), b"x").unwrap();
        std::fs::write(root.join("readme.txt"), b"x").unwrap();

        let items = scan_library(&[root.to_path_buf(), root.join("missing")]).unwrap();
        let summary: Vec<(String, ItemKind, Option<&str>)> = items
            .iter()
            .map(|i| (i.name.clone(), i.kind, i.provider_id(ExternalService::Tvdb)))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Film (1999)".to_string(), ItemKind::Movie, None),
                ("Show".to_string(), ItemKind::Series, Some("12345")),
                ("Untagged".to_string(), ItemKind::Series, None),
            ]
        );
        assert!(items[1].resolve_args.entry_by_name("trailers", true).is_some());
    }

    #[test]
    fn loose_movies_do_not_share_root_trailers() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("trailers")).unwrap();
        std::fs::write(root.join("trailers").join("alpha-teaser.mkv"), b"x").unwrap();
        std::fs::write(root.join("Alpha.mkv"), b"x").unwrap();
        std::fs::write(root.join("Beta.mkv"), b"x").unwrap();

        let items = scan_library(&[root.to_path_buf()]).unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        for item in &items {
            assert_eq!(item.kind, ItemKind::Movie);
            assert!(item.resolve_args.entry_by_name(TRAILERS_DIR, true).is_none());
        }
    }

    #[tokio::test]
    async fn resolver_classifies_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("a.nfo"), b"x").unwrap();

        let resolver = FsItemResolver;
        let video = resolver.resolve(&dir.path().join("a.mkv")).await.unwrap().unwrap();
        assert_eq!(video.kind, ItemKind::Video);
        assert!(resolver.resolve(&dir.path().join("a.nfo")).await.unwrap().is_none());
        assert!(resolver.resolve(&dir.path().join("gone.mkv")).await.unwrap().is_none());
        let folder = resolver.resolve(dir.path()).await.unwrap().unwrap();
        assert_eq!(folder.kind, ItemKind::Folder);
    }
}
