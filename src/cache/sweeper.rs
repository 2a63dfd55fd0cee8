use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Cache;

/// Prunes expired cache entries every `interval` until `shutdown` fires.
pub async fn run_cache_sweeper(
    cache: Arc<dyn Cache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!("Cache sweeper starting (interval={}s)", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pruned = cache.prune_expired();
                if pruned > 0 {
                    debug!("Pruned {} expired cache entries", pruned);
                }
            }
            _ = shutdown.cancelled() => {
                info!("Cache sweeper shutting down");
                break;
            }
        }
    }
}
