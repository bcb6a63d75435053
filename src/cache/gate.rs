//! The fetch-through cache shared by every page
//!
//! `FetchCache::get_or_fetch` answers from the cache file while an entry is
//! younger than the TTL and otherwise runs the caller's fetcher, persisting the
//! result. Two locks keep concurrent callers honest:
//!
//! - one async mutex per key, held across fetch and persist, so concurrent
//!   misses on the same key produce a single upstream call whose outcome,
//!   success or failure, every queued caller shares;
//! - one writer mutex around every load-modify-save of the file, so writes for
//!   different keys (and the sweeper) never drop each other's entries.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::error::CacheError;
use super::store::{CacheEntry, FileStore};

/// Default time-to-live for cache entries (3 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// What the gate does when a fetch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Serve the last persisted payload for the key, however old
    #[default]
    ServeStale,
    /// Always return the fetch error
    Propagate,
}

/// Where a returned payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fresh entry read from the cache
    Hit,
    /// Fetched from upstream during this call
    Fetched,
    /// Expired entry served because the fetch failed
    Stale,
}

impl Origin {
    /// Value for the `X-Cache` response header
    pub fn as_header(&self) -> &'static str {
        match self {
            Origin::Hit => "HIT",
            Origin::Fetched => "MISS",
            Origin::Stale => "STALE",
        }
    }
}

/// A payload returned by the gate along with its provenance
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub data: T,
    /// When the payload was fetched from upstream
    pub fetched_at: DateTime<Utc>,
    pub origin: Origin,
}

/// Counters reported on the health endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
    pub fetch_errors: u64,
}

/// A fetch failure handed to every caller that queued behind the fetch
#[derive(Debug, Clone)]
struct SharedFetchError(Arc<dyn std::error::Error + Send + Sync>);

impl fmt::Display for SharedFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedFetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Per-key fetch slot
///
/// The mutex is held across fetch and persist. `completed` counts finished
/// fetches so a waiter can tell whether one ended while it was queued.
#[derive(Debug, Default)]
struct InFlight {
    last_failure: Mutex<Option<SharedFetchError>>,
    completed: AtomicU64,
}

/// TTL cache in front of arbitrary fetch operations, persisted to one file
#[derive(Debug)]
pub struct FetchCache {
    store: FileStore,
    ttl: Duration,
    policy: StalePolicy,
    clock: Arc<dyn Clock>,
    writer: Mutex<()>,
    in_flight: DashMap<String, Arc<InFlight>>,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
    fetch_errors: AtomicU64,
}

impl FetchCache {
    pub fn new(store: FileStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            policy: StalePolicy::default(),
            clock: Arc::new(SystemClock),
            writer: Mutex::new(()),
            in_flight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
            fetch_errors: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Returns the cached payload for `key` if fresh, otherwise fetches it
    ///
    /// The fetch runs at most once at a time per key. Callers that queue behind
    /// it never fetch again: they observe the freshly persisted payload, or the
    /// failure of the fetch they waited on. On fetch failure the stale policy
    /// decides between the last persisted payload and `CacheError::Fetch`. A
    /// payload that was fetched but could not be persisted is still returned.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<Cached<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let flight = self.in_flight.entry(key.to_owned()).or_default().value().clone();
        let seen = flight.completed.load(Ordering::Acquire);
        let mut last_failure = flight.last_failure.lock().await;

        // Another caller may have populated the key while we waited
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        if flight.completed.load(Ordering::Acquire) != seen {
            if let Some(failure) = last_failure.clone() {
                debug!(key, "Fetch we queued behind failed, not retrying");
                return self.fetch_failed(key, failure).await;
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "Cache miss, fetching");

        match fetch().await {
            Ok(data) => {
                let fetched_at = self.clock.now();
                match serde_json::to_value(&data) {
                    Ok(value) => {
                        if let Err(e) = self.write_entry(key, value, fetched_at).await {
                            warn!(key, error = %e, "Failed to persist fetched payload");
                        }
                    }
                    Err(e) => warn!(key, error = %e, "Fetched payload is not JSON-encodable, not caching"),
                }
                *last_failure = None;
                flight.completed.fetch_add(1, Ordering::Release);
                drop(last_failure);
                Ok(Cached {
                    data,
                    fetched_at,
                    origin: Origin::Fetched,
                })
            }
            Err(e) => {
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(key, error = %e, "Fetch failed");
                let failure = SharedFetchError(Arc::new(e));
                *last_failure = Some(failure.clone());
                flight.completed.fetch_add(1, Ordering::Release);
                drop(last_failure);
                self.fetch_failed(key, failure).await
            }
        }
    }

    /// Resolves a failed fetch into the stale payload or an error
    async fn fetch_failed<T: DeserializeOwned>(
        &self,
        key: &str,
        failure: SharedFetchError,
    ) -> Result<Cached<T>, CacheError> {
        if self.policy == StalePolicy::ServeStale {
            if let Some((data, fetched_at)) = self.read_entry::<T>(key).await {
                warn!(key, %fetched_at, "Serving stale payload");
                self.stale_served.fetch_add(1, Ordering::Relaxed);
                return Ok(Cached {
                    data,
                    fetched_at,
                    origin: Origin::Stale,
                });
            }
        }
        Err(CacheError::Fetch {
            key: key.to_owned(),
            source: Box::new(failure),
        })
    }

    /// Returns the payload for `key` only if it is younger than the TTL
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        let entry = self.store.load().await.remove(key)?;
        let age = entry.age_secs(self.clock.now());
        if age >= self.ttl.as_secs_f64() {
            return None;
        }

        let fetched_at = entry.fetched_at();
        match serde_json::from_value(entry.data) {
            Ok(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, age_secs = age, "Cache hit");
                Some(Cached {
                    data,
                    fetched_at,
                    origin: Origin::Hit,
                })
            }
            Err(e) => {
                debug!(key, error = %e, "Cached payload has unexpected shape, treating as miss");
                None
            }
        }
    }

    /// Stores `data` under `key`, stamped with the current time
    pub async fn put<T: Serialize>(&self, key: &str, data: &T) -> Result<(), CacheError> {
        let value = serde_json::to_value(data).map_err(|source| CacheError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.write_entry(key, value, self.clock.now()).await
    }

    /// Removes every entry older than the TTL and returns the removed keys
    ///
    /// The file is only rewritten when something was removed.
    pub async fn sweep(&self) -> Result<Vec<String>, CacheError> {
        let _writer = self.writer.lock().await;
        let mut store = self.store.load().await;
        let now = self.clock.now();
        let ttl = self.ttl.as_secs_f64();

        let expired: Vec<String> = store
            .iter()
            .filter(|(_, entry)| entry.age_secs(now) > ttl)
            .map(|(key, _)| key.clone())
            .collect();

        if !expired.is_empty() {
            for key in &expired {
                store.remove(key);
            }
            self.store
                .save(&store)
                .await
                .map_err(|source| self.persist_error(source))?;
        }

        Ok(expired)
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.load().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
        }
    }

    /// Reads the entry for `key` regardless of age
    async fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<(T, DateTime<Utc>)> {
        let entry = self.store.load().await.remove(key)?;
        let fetched_at = entry.fetched_at();
        serde_json::from_value(entry.data).ok().map(|data| (data, fetched_at))
    }

    async fn write_entry(&self, key: &str, value: Value, fetched_at: DateTime<Utc>) -> Result<(), CacheError> {
        let _writer = self.writer.lock().await;
        // Reload under the writer lock so entries written since our read survive
        let mut store = self.store.load().await;
        store.insert(key.to_owned(), CacheEntry::new(value, fetched_at));
        self.store
            .save(&store)
            .await
            .map_err(|source| self.persist_error(source))
    }

    fn persist_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Persist {
            path: self.store.path().to_path_buf(),
            source,
        }
    }
}
