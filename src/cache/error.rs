use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the fetch cache
///
/// Read failures never appear here: a missing or unreadable cache file is
/// treated as an empty cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The upstream fetch failed and no stale entry could be served
    #[error("fetch for '{key}' failed: {source}")]
    Fetch {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The payload could not be converted to JSON
    #[error("failed to encode payload for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The cache file could not be rewritten
    #[error("failed to persist cache file {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
