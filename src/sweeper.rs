//! Background eviction of expired cache entries
//!
//! A single tokio task alternates between scanning the cache file for entries
//! older than the TTL and sleeping for the sweep interval. The first scan runs
//! immediately. Failed scans are logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::FetchCache;

/// Outcome of one sweep iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    /// The scan finished; `removed` lists the evicted keys
    Completed { removed: Vec<String> },
    /// The scan failed and will be retried after the next sleep
    Failed(String),
}

/// Configuration for the sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between two scans
    pub interval: Duration,
    /// Whether the sweeper runs at all
    pub enabled: bool,
}

impl SweeperConfig {
    /// Sweeps every `interval`
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::every(crate::cache::DEFAULT_TTL)
    }
}

/// Handle for controlling the background sweeper
///
/// Dropping the handle also stops the sweeper.
pub struct SweeperHandle {
    /// Channel receiving one event per iteration; events are dropped when full
    pub receiver: mpsc::Receiver<SweepEvent>,
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Spawns the sweeper task on the current tokio runtime
    pub fn spawn(cache: Arc<FetchCache>, config: SweeperConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = config.enabled.then(|| {
            let interval = config.interval;
            tokio::spawn(async move {
                loop {
                    let event = match cache.sweep().await {
                        Ok(removed) => {
                            if removed.is_empty() {
                                debug!("Cache sweep found nothing to evict");
                            } else {
                                info!(keys = ?removed, "Cache cleared");
                            }
                            SweepEvent::Completed { removed }
                        }
                        Err(e) => {
                            error!(error = %e, "Cache sweep failed");
                            SweepEvent::Failed(e.to_string())
                        }
                    };
                    let _ = event_tx.try_send(event);

                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = shutdown_rx.recv() => {
                            debug!("Sweeper shutting down");
                            break;
                        }
                    }
                }
            })
        });

        Self {
            receiver: event_rx,
            shutdown_tx,
            task,
        }
    }

    /// Stops the sweeper and waits for the task to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Checks for a pending sweep event without blocking
pub fn try_recv(handle: &mut SweeperHandle) -> Option<SweepEvent> {
    handle.receiver.try_recv().ok()
}
