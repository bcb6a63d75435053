//! Shared fetch cache persisted to disk
//!
//! Every page goes through [`FetchCache::get_or_fetch`], which serves fresh
//! entries from a single JSON file and otherwise calls the page's fetcher.
//! Expired entries are removed by the background sweeper (see
//! [`crate::sweeper`]) and may be served as a fallback while a fetch fails.

mod clock;
mod error;
mod gate;
mod store;

pub use clock::{from_unix_seconds, to_unix_seconds, Clock, ManualClock, SystemClock};
pub use error::CacheError;
pub use gate::{CacheStats, Cached, FetchCache, Origin, StalePolicy, DEFAULT_TTL};
pub use store::{CacheEntry, CacheStore, FileStore};
