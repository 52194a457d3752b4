//! Cache key and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coord::{ViewportBounds, COORDINATE_PRECISION};

/// Default maximum number of cached fog results.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// Default time to live of a cached result (5 minutes).
pub const DEFAULT_CACHE_EXPIRATION_MS: u64 = 5 * 60 * 1000;

/// Default expiry sweep interval (60 seconds).
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60 * 1000;

/// Default fill ratio a gentle optimize trims down to.
pub const DEFAULT_TARGET_RATIO: f64 = 0.8;

/// Default access count below which an aggressive optimize drops an entry.
pub const DEFAULT_MIN_ACCESS_COUNT: u64 = 2;

/// Cache key identifying a fog result.
///
/// Bounds are quantized to `10^-precision` degrees, so viewports that differ
/// only below that precision share an entry. Intermediate and final results
/// never share a key, and neither do results computed at different zoom
/// buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// `[minLon, minLat, maxLon, maxLat]` in units of `10^-precision` degrees.
    pub bounds: [i64; 4],
    /// Fingerprint of the revealed-area set the result was computed from.
    pub fingerprint: String,
    pub intermediate: bool,
    /// Zoom bucket the result was computed at; `None` when it does not
    /// depend on zoom.
    pub zoom: Option<u8>,
}

impl CacheKey {
    pub fn new(
        bounds: &ViewportBounds,
        fingerprint: impl Into<String>,
        intermediate: bool,
        precision: u32,
    ) -> Self {
        Self {
            bounds: quantize_bounds(bounds, precision),
            fingerprint: fingerprint.into(),
            intermediate,
            zoom: None,
        }
    }

    /// Scopes the key to a zoom bucket.
    pub fn at_zoom(mut self, zoom: Option<u8>) -> Self {
        self.zoom = zoom;
        self
    }
}

/// Quantizes bounds to integer steps of `10^-precision` degrees.
///
/// Non-finite components saturate (NaN maps to zero).
pub fn quantize_bounds(bounds: &ViewportBounds, precision: u32) -> [i64; 4] {
    let scale = 10f64.powi(precision as i32);
    bounds.to_array().map(|v| (v * scale).round() as i64)
}

/// Fog result cache configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fogmap::cache::FogCacheConfig;
///
/// let config = FogCacheConfig::new()
///     .with_max_cache_size(20)
///     .with_cache_expiration(Duration::from_secs(30));
/// assert_eq!(config.max_cache_size(), 20);
/// assert_eq!(config.cache_expiration(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogCacheConfig {
    max_cache_size: usize,
    cache_expiration_ms: u64,
    cleanup_interval_ms: u64,
    target_ratio: f64,
    min_access_count: u64,
    coordinate_precision: u32,
}

impl FogCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_cache_size(mut self, entries: usize) -> Self {
        self.max_cache_size = entries;
        self
    }

    /// Set how long an entry stays valid after it was stored.
    pub fn with_cache_expiration(mut self, ttl: Duration) -> Self {
        self.cache_expiration_ms = ttl.as_millis() as u64;
        self
    }

    /// Set how often the expiry daemon sweeps.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the fill ratio (0.0-1.0) that a gentle optimize trims down to.
    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_min_access_count(mut self, count: u64) -> Self {
        self.min_access_count = count;
        self
    }

    /// Set the number of decimals kept in cached coordinates and keys.
    pub fn with_coordinate_precision(mut self, decimals: u32) -> Self {
        self.coordinate_precision = decimals.min(15);
        self
    }

    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    pub fn cache_expiration(&self) -> Duration {
        Duration::from_millis(self.cache_expiration_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn target_ratio(&self) -> f64 {
        self.target_ratio
    }

    pub fn min_access_count(&self) -> u64 {
        self.min_access_count
    }

    pub fn coordinate_precision(&self) -> u32 {
        self.coordinate_precision
    }
}

impl Default for FogCacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            cache_expiration_ms: DEFAULT_CACHE_EXPIRATION_MS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            target_ratio: DEFAULT_TARGET_RATIO,
            min_access_count: DEFAULT_MIN_ACCESS_COUNT,
            coordinate_precision: COORDINATE_PRECISION,
        }
    }
}
