//! Periodic expiry sweeping for query caches.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use tessera_cache::QueryCache;

/// Background task that periodically removes expired cache entries.
///
/// Sweeping is an optimization: entries also expire lazily on access, so a
/// stopped sweeper never causes stale reads, only slower memory reclaim.
pub struct CacheSweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Spawn a sweeper over `cache`, waking every `interval`.
    pub fn start<R>(cache: Arc<QueryCache<R>>, interval: Duration) -> Self
    where
        R: Clone + Serialize + Send + Sync + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the first sweep
            // happens one interval after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let swept = cache.cleanup_expired();
                        if swept.total() > 0 {
                            debug!(
                                results = swept.results_removed,
                                embeddings = swept.embeddings_removed,
                                "cache sweep removed expired entries"
                            );
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("cache sweeper stopping");
                        break;
                    }
                }
            }
        });
        info!(interval_secs = interval.as_secs_f64(), "cache sweeper started");
        Self { stop_tx, handle }
    }

    /// Stop the sweeper and wait for its task to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}
