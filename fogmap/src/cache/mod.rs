//! Fog result cache.
//!
//! Memoizes fog results by (viewport, revealed-area fingerprint) with a size
//! bound, LRU eviction, TTL expiry and coordinate compression. Intermediate
//! results (computed while the viewport is moving) live in their own key
//! space.

mod daemon;
mod memory;
mod stats;
mod types;

pub use daemon::run_expiry_daemon;
pub use memory::FogCache;
pub use stats::FogCacheStats;
pub use types::{
    quantize_bounds, CacheKey, FogCacheConfig, DEFAULT_CACHE_EXPIRATION_MS, DEFAULT_CLEANUP_INTERVAL_MS,
    DEFAULT_MAX_CACHE_SIZE, DEFAULT_MIN_ACCESS_COUNT, DEFAULT_TARGET_RATIO,
};
