//! Configuration loading for the command-line application.
//!
//! The types live in [`mf_core::config`]; this module finds and reads the
//! file and reports validation warnings.

pub use mf_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Default search locations, in order.
const DEFAULT_PATHS: [&str; 3] = [
    "./mediaforged.toml",
    "~/.config/mediaforged/config.toml",
    "/etc/mediaforged/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{warning}");
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    tracing::debug!("No config file found; using defaults");
    Ok(Config::default())
}
