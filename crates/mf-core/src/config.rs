//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! library, metadata, and HTTP sub-configs. Every section defaults sensibly
//! so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Default request template for the fan-art web service. `{api_key}` and
/// `{id}` are substituted per request.
pub const DEFAULT_FANART_URL: &str =
    "http://api.fanart.tv/webservice/series/{api_key}/{id}/xml/all/1/1";

/// Name of the resource pool guarding the fan-art host.
pub const FANART_POOL: &str = "fanart";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub metadata: MetadataConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let meta = &self.metadata;

        if meta.series_images.any_enabled() && meta.fanart.api_key.is_none() {
            warnings.push(
                "metadata.fanart.api_key is not set; fan-art downloads are disabled".into(),
            );
        }

        let lang = meta.preferred_language.trim();
        if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
            warnings.push(format!(
                "metadata.preferred_language '{}' is not a two-letter language code",
                meta.preferred_language
            ));
        }

        if !meta.fanart.base_url.contains("{id}") {
            warnings.push("metadata.fanart.base_url has no {id} placeholder".into());
        }

        for (i, pool) in meta.pools.iter().enumerate() {
            if pool.capacity == 0 {
                warnings.push(format!(
                    "metadata.pools[{i}] '{}' has capacity 0; it will be raised to 1",
                    pool.name
                ));
            }
        }

        if !meta.pools.iter().any(|p| p.name == FANART_POOL) {
            warnings.push(format!(
                "no '{FANART_POOL}' pool configured; a capacity of 1 will be used"
            ));
        }

        if self.library.concurrency == 0 {
            warnings.push("library.concurrency is 0; it will be raised to 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Library scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directories whose top-level folders are treated as series.
    pub paths: Vec<PathBuf>,
    /// Number of item pipelines run in parallel.
    pub concurrency: usize,
    /// JSON file used to persist refresh records between runs.
    pub state_path: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            concurrency: 4,
            state_path: None,
        }
    }
}

/// Metadata enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// ISO-639-1 language preferred for localized artwork.
    pub preferred_language: String,
    /// Prefer high-definition artwork variants when available.
    pub download_hd_fanart: bool,
    /// Save downloaded artwork next to the media instead of the cache dir.
    pub save_local_meta: bool,
    /// Days after which previously fetched data is refreshed.
    pub staleness_days: u32,
    pub series_images: ImageToggles,
    pub fanart: FanartConfig,
    pub pools: Vec<PoolConfig>,
    /// Directory for downloaded artwork when `save_local_meta` is off.
    pub cache_dir: PathBuf,
}

impl MetadataConfig {
    /// Staleness window as a duration.
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.staleness_days) * 24 * 60 * 60)
    }

    /// Lowercased, trimmed preferred language.
    pub fn language(&self) -> String {
        self.preferred_language.trim().to_lowercase()
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            preferred_language: "en".into(),
            download_hd_fanart: true,
            save_local_meta: false,
            staleness_days: 30,
            series_images: ImageToggles::default(),
            fanart: FanartConfig::default(),
            pools: vec![PoolConfig {
                name: FANART_POOL.into(),
                capacity: 2,
            }],
            cache_dir: PathBuf::from("./data/metadata"),
        }
    }
}

/// Per image kind download toggles for series artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageToggles {
    pub logo: bool,
    pub art: bool,
    pub thumb: bool,
}

impl ImageToggles {
    pub fn any_enabled(&self) -> bool {
        self.logo || self.art || self.thumb
    }
}

impl Default for ImageToggles {
    fn default() -> Self {
        Self {
            logo: true,
            art: true,
            thumb: true,
        }
    }
}

/// Fan-art web service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanartConfig {
    pub api_key: Option<String>,
    /// URL template with `{api_key}` and `{id}` placeholders.
    pub base_url: String,
}

impl Default for FanartConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_FANART_URL.into(),
        }
    }
}

/// A named concurrency gate for one external host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub capacity: usize,
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Upper bound on requests per second across all hosts.
    pub requests_per_second: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            requests_per_second: 10,
            user_agent: concat!("mediaforged/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}
