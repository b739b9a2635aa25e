//! Refresh decisions and the per (item, provider) refresh record store.
//!
//! The default policy is assembled from small helpers that every provider
//! calls explicitly from its [`MetadataProvider::needs_refresh`]:
//!
//! 1. A required external id missing on the item means nothing to query.
//! 2. Every feature toggle the provider acts on being disabled means nothing
//!    to do.
//! 3. Otherwise the record decides: never fetched, written by another
//!    provider version, or older than the staleness window.
//!
//! Records only ever move forward in time and are only written when a
//! provider invocation is committed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mf_core::config::MetadataConfig;
use mf_core::{ExternalService, ItemId, MediaItem};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::provider::MetadataProvider;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Last successful refresh of one item by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub provider: String,
    pub provider_version: u32,
    pub last_refreshed: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn new(provider: impl Into<String>, provider_version: u32, at: DateTime<Utc>) -> Self {
        Self {
            provider: provider.into(),
            provider_version,
            last_refreshed: at,
        }
    }

    /// Record another success. The timestamp never moves backwards.
    pub fn advance(&mut self, provider_version: u32, at: DateTime<Utc>) {
        self.provider_version = provider_version;
        if at > self.last_refreshed {
            self.last_refreshed = at;
        }
    }
}

/// Storage for refresh records.
pub trait RefreshStore: Send + Sync {
    fn last_refreshed(&self, item: ItemId, provider: &str) -> Option<RefreshRecord>;

    /// Create or advance the record after a committed fetch.
    fn set_last_refreshed(
        &self,
        item: ItemId,
        provider: &str,
        provider_version: u32,
        at: DateTime<Utc>,
    ) -> mf_core::Result<RefreshRecord>;
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    item_id: ItemId,
    #[serde(flatten)]
    record: RefreshRecord,
}

/// In-memory record store, optionally mirrored to a JSON file.
pub struct RefreshRecords {
    records: RwLock<HashMap<(ItemId, String), RefreshRecord>>,
    persistence_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl RefreshRecords {
    /// Create a store. When `persistence_path` exists its records are loaded.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        let store = Self {
            records: RwLock::new(HashMap::new()),
            persistence_path,
            write_lock: Mutex::new(()),
        };

        if let Some(ref path) = store.persistence_path {
            if let Err(e) = store.load_from_file(path) {
                tracing::warn!("Failed to load refresh records from {}: {e}", path.display());
            }
        }

        store
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn load_from_file(&self, path: &Path) -> mf_core::Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let persisted: Vec<PersistedRecord> = serde_json::from_str(&content)
            .map_err(|e| mf_core::Error::Parse(format!("refresh records: {e}")))?;

        let mut records = self.records.write();
        for entry in persisted {
            records.insert((entry.item_id, entry.record.provider.clone()), entry.record);
        }
        tracing::debug!(count = records.len(), "Loaded refresh records");

        Ok(())
    }

    fn persist(&self) -> mf_core::Result<()> {
        let Some(ref path) = self.persistence_path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock();
        let mut snapshot: Vec<PersistedRecord> = self
            .records
            .read()
            .iter()
            .map(|((item_id, _), record)| PersistedRecord {
                item_id: *item_id,
                record: record.clone(),
            })
            .collect();
        snapshot.sort_by(|a, b| {
            (a.item_id, &a.record.provider).cmp(&(b.item_id, &b.record.provider))
        });

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| mf_core::Error::Internal(format!("serialize refresh records: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl RefreshStore for RefreshRecords {
    fn last_refreshed(&self, item: ItemId, provider: &str) -> Option<RefreshRecord> {
        self.records.read().get(&(item, provider.to_string())).cloned()
    }

    fn set_last_refreshed(
        &self,
        item: ItemId,
        provider: &str,
        provider_version: u32,
        at: DateTime<Utc>,
    ) -> mf_core::Result<RefreshRecord> {
        let key = (item, provider.to_string());
        let (record, previous) = {
            let mut records = self.records.write();
            let previous = records.get(&key).cloned();
            let record = records
                .entry(key.clone())
                .and_modify(|r| r.advance(provider_version, at))
                .or_insert_with(|| RefreshRecord::new(provider, provider_version, at))
                .clone();
            (record, previous)
        };

        if let Err(e) = self.persist() {
            // Not committed: restore the previous in-memory state.
            let mut records = self.records.write();
            match previous {
                Some(previous) => records.insert(key, previous),
                None => records.remove(&key),
            };
            return Err(e);
        }
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Decision helpers
// ---------------------------------------------------------------------------

/// What a provider needs in place before a refresh is worth attempting.
#[derive(Debug, Clone, Copy)]
pub struct RefreshRequirements<'a> {
    /// External id the provider queries by, if any.
    pub required_id: Option<ExternalService>,
    /// Feature toggles the provider acts on. Empty means "always enabled".
    pub toggles: &'a [bool],
    pub provider_version: u32,
    pub staleness: Duration,
}

/// The default policy shared by remote providers.
pub fn needs_refresh(
    item: &MediaItem,
    requirements: &RefreshRequirements<'_>,
    last: Option<&RefreshRecord>,
    now: DateTime<Utc>,
) -> bool {
    if let Some(service) = requirements.required_id {
        if item.provider_id(service).is_none() {
            return false;
        }
    }

    if !any_enabled(requirements.toggles) {
        return false;
    }

    is_stale(last, requirements.provider_version, requirements.staleness, now)
}

/// `false` only when toggles exist and every one of them is off.
pub fn any_enabled(toggles: &[bool]) -> bool {
    toggles.is_empty() || toggles.iter().any(|enabled| *enabled)
}

/// Recency policy: never fetched, fetched by another provider version, or
/// older than `staleness`.
pub fn is_stale(
    last: Option<&RefreshRecord>,
    provider_version: u32,
    staleness: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some(last) = last else {
        return true;
    };

    if last.provider_version != provider_version {
        return true;
    }

    match now.signed_duration_since(last.last_refreshed).to_std() {
        Ok(elapsed) => elapsed > staleness,
        // Record from the future (clock skew): keep it.
        Err(_) => false,
    }
}

/// Entry point used by the orchestrator. A forced refresh hides the record
/// from the provider, which bypasses recency but keeps the provider's own
/// configuration checks.
pub fn should_refresh(
    provider: &dyn MetadataProvider,
    item: &MediaItem,
    last: Option<&RefreshRecord>,
    config: &MetadataConfig,
    now: DateTime<Utc>,
    force: bool,
) -> bool {
    let last = if force { None } else { last };
    provider.needs_refresh(item, last, config, now)
}
