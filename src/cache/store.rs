//! Disk persistence for the shared cache
//!
//! The whole cache lives in one JSON object keyed by cache key, each value
//! being `{ "data": <any>, "time": <unix seconds> }`. The file is read and
//! rewritten as a unit; writes go through a temporary file and a rename so a
//! concurrent reader sees either the old or the new file, never a torn one.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::clock::{from_unix_seconds, to_unix_seconds};

/// File name used inside the platform cache directory
const CACHE_FILE_NAME: &str = "cache.json";

/// A single cached payload and the moment it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The payload as returned by the fetcher
    pub data: Value,
    /// Unix timestamp (fractional seconds) of the fetch that produced `data`
    pub time: f64,
}

impl CacheEntry {
    pub fn new(data: Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            data,
            time: to_unix_seconds(fetched_at),
        }
    }

    /// Seconds elapsed between the fetch and `now`
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        to_unix_seconds(now) - self.time
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        from_unix_seconds(self.time)
    }
}

/// The full cache contents, keyed by cache key
pub type CacheStore = BTreeMap<String, CacheEntry>;

/// Reads and writes the cache file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file in the XDG cache directory
    ///
    /// `~/.cache/kioskdash/cache.json` on Linux. Returns `None` when no home
    /// directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "kioskdash")?;
        Some(project_dirs.cache_dir().join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole cache
    ///
    /// A missing file, an unreadable file or invalid JSON all yield an empty
    /// store. Individual entries that do not have the `{data, time}` shape are
    /// dropped and the remaining entries are kept.
    pub async fn load(&self) -> CacheStore {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return CacheStore::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache file unreadable, using empty cache");
                return CacheStore::new();
            }
        };

        let raw: BTreeMap<String, Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache file corrupt, using empty cache");
                return CacheStore::new();
            }
        };

        raw.into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => Some((key, entry)),
                Err(e) => {
                    debug!(key = %key, error = %e, "Skipping malformed cache entry");
                    None
                }
            })
            .collect()
    }

    /// Replaces the cache file with `store`
    ///
    /// Creates the parent directory if needed. The new content is written to a
    /// sibling temporary file which is then renamed over the cache file.
    pub async fn save(&self, store: &CacheStore) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(store)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp_path = self.tmp_path();
        if let Err(e) = fs::write(&tmp_path, json).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| CACHE_FILE_NAME.to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }
}
