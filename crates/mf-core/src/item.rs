//! The media item data model enriched by metadata providers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::media::{ExternalService, ImageType, ItemKind};
use crate::paths;

/// A library item whose metadata is filled in by providers.
///
/// Fields are only changed by committing a provider's result; a pipeline run
/// never leaves an item half-updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    /// File or directory backing this item.
    pub path: PathBuf,
    /// Stored artwork keyed by image type.
    #[serde(default)]
    pub images: BTreeMap<ImageType, PathBuf>,
    /// Trailers discovered alongside the item.
    #[serde(default)]
    pub local_trailers: Vec<TrailerRef>,
    /// External identifiers keyed by service (e.g. `tvdb -> "12345"`).
    #[serde(default)]
    pub provider_ids: BTreeMap<ExternalService, String>,
    /// Snapshot of the item's directory taken when it was resolved.
    #[serde(skip)]
    pub resolve_args: ResolveArgs,
}

impl MediaItem {
    /// Create an item with a path-derived id and no metadata.
    pub fn new(name: impl Into<String>, kind: ItemKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: ItemId::from_path(&path),
            name: name.into(),
            kind,
            path,
            images: BTreeMap::new(),
            local_trailers: Vec::new(),
            provider_ids: BTreeMap::new(),
            resolve_args: ResolveArgs::default(),
        }
    }

    /// Builder: attach an external identifier.
    pub fn with_provider_id(mut self, service: ExternalService, id: impl Into<String>) -> Self {
        self.provider_ids.insert(service, id.into());
        self
    }

    /// Builder: attach a directory snapshot.
    pub fn with_resolve_args(mut self, args: ResolveArgs) -> Self {
        self.resolve_args = args;
        self
    }

    /// The external id for `service`, treating blank values as absent.
    pub fn provider_id(&self, service: ExternalService) -> Option<&str> {
        self.provider_ids
            .get(&service)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Stored path for the given image type.
    pub fn image(&self, image_type: ImageType) -> Option<&Path> {
        self.images.get(&image_type).map(|p| p.as_path())
    }

    /// Directory that holds the item's side files (trailers, artwork).
    pub fn meta_dir(&self) -> &Path {
        if self.kind.is_video() {
            self.path.parent().unwrap_or(&self.path)
        } else {
            &self.path
        }
    }
}

/// Reference to a trailer item associated with a parent item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailerRef {
    pub id: ItemId,
    pub path: PathBuf,
}

/// A single entry in an item's directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Directory listing captured when an item is resolved.
///
/// Providers consult it to find well-known subdirectories and to detect
/// locally supplied artwork that should take precedence over downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveArgs {
    entries: Vec<FileSystemEntry>,
}

impl ResolveArgs {
    pub fn new(entries: Vec<FileSystemEntry>) -> Self {
        Self { entries }
    }

    /// Read the top level of `dir`.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            entries.push(FileSystemEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                is_dir: file_type.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[FileSystemEntry] {
        &self.entries
    }

    /// Find an entry by name, case-insensitively.
    pub fn entry_by_name(&self, name: &str, directories_only: bool) -> Option<&FileSystemEntry> {
        self.entries
            .iter()
            .filter(|e| !directories_only || e.is_dir)
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Whether an image file named `stem` (any image extension) is present.
    pub fn contains_meta_file(&self, stem: &str) -> bool {
        self.entries.iter().any(|e| {
            !e.is_dir
                && paths::is_image_file(&e.path)
                && paths::stem_lowercase(&e.path).as_deref() == Some(&stem.to_lowercase())
        })
    }
}
