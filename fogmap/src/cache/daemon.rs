//! Background expiry sweep for the fog cache.
//!
//! Runs on the tokio runtime and removes expired entries every interval until
//! cancelled. This is the only task that mutates the cache on a timer.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fogmap::cache::{run_expiry_daemon, FogCache};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn start() {
//! let cache = Arc::new(FogCache::default());
//! let cancellation = CancellationToken::new();
//! let interval = cache.config().cleanup_interval();
//! tokio::spawn(run_expiry_daemon(cache, interval, cancellation.clone()));
//! // ...
//! cancellation.cancel();
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::memory::FogCache;

/// Shortest accepted sweep interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Sweeps `cache` for expired entries every `interval` until `cancellation` fires.
///
/// One sweep runs immediately on start.
pub async fn run_expiry_daemon(cache: Arc<FogCache>, interval: Duration, cancellation: CancellationToken) {
    let interval = interval.max(MIN_INTERVAL);
    info!(
        interval_ms = interval.as_millis() as u64,
        ttl_ms = cache.config().cache_expiration().as_millis() as u64,
        "Starting fog cache expiry daemon"
    );

    sweep(&cache);

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("Fog cache expiry daemon shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                sweep(&cache);
            }
        }
    }
}

fn sweep(cache: &FogCache) {
    let removed = cache.remove_expired();
    debug!(removed, remaining = cache.len(), "Fog cache sweep complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FogCacheConfig;
    use crate::coord::ViewportBounds;
    use crate::fog::{FogEngine, FogOptions};

    fn filled_cache(ttl: Duration) -> Arc<FogCache> {
        let cache = Arc::new(FogCache::new(FogCacheConfig::new().with_cache_expiration(ttl)));
        let bounds = ViewportBounds::new(0.0, 0.0, 1.0, 1.0);
        let result = FogEngine::default().calculate_viewport_fog(None, &FogOptions::for_viewport(bounds));
        cache.set(&bounds, "fp", &result, false);
        cache
    }

    #[tokio::test]
    async fn test_daemon_removes_expired_entries() {
        let cache = filled_cache(Duration::from_millis(10));
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(run_expiry_daemon(
            Arc::clone(&cache),
            Duration::from_millis(10),
            cancellation.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.is_empty());
        assert_eq!(cache.get_stats().expired_entries, 1);

        cancellation.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_daemon_keeps_fresh_entries() {
        let cache = filled_cache(Duration::from_secs(300));
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(run_expiry_daemon(
            Arc::clone(&cache),
            Duration::from_millis(5),
            cancellation.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.len(), 1);

        cancellation.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_daemon_stops_on_cancel() {
        let cache = Arc::new(FogCache::default());
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let finished = tokio::time::timeout(
            Duration::from_secs(1),
            run_expiry_daemon(cache, Duration::from_secs(60), cancellation),
        )
        .await;
        assert!(finished.is_ok());
    }
}
