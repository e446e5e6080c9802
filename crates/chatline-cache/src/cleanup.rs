//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use crate::store::MemoryCache;

/// Spawn the periodic expiry sweep for a cache store.
///
/// Lazy eviction in `get` only reclaims keys that are still being asked
/// for; the sweep reclaims the rest. Abort the returned handle at
/// shutdown.
pub fn spawn_cleanup_task(
    store: Arc<MemoryCache>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            let removed = store.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "swept expired cache entries");
            }
        }
    })
}
