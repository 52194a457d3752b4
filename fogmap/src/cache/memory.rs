//! In-memory fog result cache with TTL and LRU eviction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use geojson::{Feature, Geometry, Value};
use tracing::{debug, info};

use super::stats::{Counters, FogCacheStats};
use super::types::{quantize_bounds, CacheKey, FogCacheConfig};
use crate::coord::{round_coordinate, ViewportBounds};
use crate::fog::FogResult;
use crate::geometry::vertex_count;

/// Fixed per-entry overhead (key, timestamps, metrics, collection).
const ENTRY_OVERHEAD_BYTES: usize = 512;
/// One two-component position.
const POSITION_BYTES: usize = 2 * std::mem::size_of::<f64>() + 3 * std::mem::size_of::<usize>();

/// Entry in the fog cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    result: FogResult,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
    estimated_bytes: usize,
}

impl CacheEntry {
    fn new(result: FogResult) -> Self {
        let now = Instant::now();
        Self {
            estimated_bytes: estimate_bytes(&result),
            result,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    counters: Counters,
}

impl CacheState {
    /// Removes the least recently used entry, ties going to the lowest access count.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.last_accessed
                    .cmp(&b.last_accessed)
                    .then_with(|| a.access_count.cmp(&b.access_count))
            })
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                self.entries.remove(&key);
                self.counters.record_evicted(1);
                true
            }
            None => false,
        }
    }

    fn remove_expired(&mut self, config: &FogCacheConfig) -> usize {
        let ttl = config.cache_expiration();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        let removed = before - self.entries.len();
        self.counters.record_expired(removed);
        removed
    }
}

/// Memoizes fog results by viewport and revealed-area fingerprint.
///
/// Every operation takes one mutex, so a lookup never observes a half-updated
/// entry and the expiry sweep never overlaps a `get` or `set`.
///
/// Expired entries are reported as misses but only removed by
/// [`remove_expired`](Self::remove_expired) (normally from the expiry daemon)
/// or [`optimize_cache`](Self::optimize_cache).
pub struct FogCache {
    config: FogCacheConfig,
    state: Mutex<CacheState>,
}

impl FogCache {
    pub fn new(config: FogCacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &FogCacheConfig {
        &self.config
    }

    /// Looks up a result.
    ///
    /// A hit refreshes the entry's recency and access count.
    pub fn get(&self, bounds: &ViewportBounds, fingerprint: &str, is_intermediate: bool) -> Option<FogResult> {
        self.get_at_zoom(bounds, fingerprint, is_intermediate, None)
    }

    /// Looks up a result computed at a zoom bucket.
    ///
    /// Entries stored at another bucket, or without one, never match.
    pub fn get_at_zoom(
        &self,
        bounds: &ViewportBounds,
        fingerprint: &str,
        is_intermediate: bool,
        zoom: Option<u8>,
    ) -> Option<FogResult> {
        let key = self.key(bounds, fingerprint, is_intermediate).at_zoom(zoom);
        let ttl = self.config.cache_expiration();
        let mut state = self.lock();

        let hit = match state.entries.get_mut(&key) {
            Some(entry) if entry.created_at.elapsed() < ttl => {
                entry.touch();
                Some(entry.result.clone())
            }
            _ => None,
        };

        match &hit {
            Some(result) => state.counters.record_hit(result.calculation_time_ms),
            None => state.counters.record_miss(),
        }
        hit
    }

    /// Stores a result, evicting the least recently used entry when full.
    ///
    /// Coordinates are rounded to the configured precision before storing.
    /// Replacing an existing key never evicts.
    pub fn set(&self, bounds: &ViewportBounds, fingerprint: &str, result: &FogResult, is_intermediate: bool) {
        self.set_at_zoom(bounds, fingerprint, result, is_intermediate, None);
    }

    /// Stores a result computed at a zoom bucket.
    pub fn set_at_zoom(
        &self,
        bounds: &ViewportBounds,
        fingerprint: &str,
        result: &FogResult,
        is_intermediate: bool,
        zoom: Option<u8>,
    ) {
        let max = self.config.max_cache_size();
        if max == 0 {
            return;
        }

        let key = self.key(bounds, fingerprint, is_intermediate).at_zoom(zoom);
        let entry = CacheEntry::new(compress(result, self.config.coordinate_precision()));
        let mut state = self.lock();

        if !state.entries.contains_key(&key) {
            while state.entries.len() >= max && state.evict_one() {}
        }
        state.entries.insert(key, entry);
    }

    /// Drops results tied to stale data.
    ///
    /// With a fingerprint, removes every entry computed from a different one.
    /// Without, removes everything. Returns the number of entries removed.
    pub fn invalidate(&self, current_fingerprint: Option<&str>) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        match current_fingerprint {
            Some(fingerprint) => state.entries.retain(|key, _| key.fingerprint == fingerprint),
            None => state.entries.clear(),
        }
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(removed, "Fog cache invalidated");
        }
        removed
    }

    /// Removes entries cached for exactly these bounds (at key precision).
    ///
    /// Overlapping but different viewports are left alone.
    pub fn invalidate_viewport(&self, bounds: &ViewportBounds) -> usize {
        let target = quantize_bounds(bounds, self.config.coordinate_precision());
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| key.bounds != target);
        before - state.entries.len()
    }

    /// Removes entries older than the configured expiration.
    pub fn remove_expired(&self) -> usize {
        let removed = self.lock().remove_expired(&self.config);
        if removed > 0 {
            debug!(removed, "Expired fog cache entries removed");
        }
        removed
    }

    /// Shrinks the cache.
    ///
    /// Gentle: removes expired entries, then evicts LRU entries until the
    /// cache holds at most `target_ratio * max_cache_size`. Aggressive: also
    /// evicts entries accessed fewer than `min_access_count` times. Returns
    /// the number of entries removed.
    pub fn optimize_cache(&self, aggressive: bool) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();

        state.remove_expired(&self.config);

        let target = (self.config.max_cache_size() as f64 * self.config.target_ratio()).floor() as usize;
        while state.entries.len() > target && state.evict_one() {}

        if aggressive {
            let min = self.config.min_access_count();
            let remaining = state.entries.len();
            state.entries.retain(|_, entry| entry.access_count >= min);
            let dropped = remaining - state.entries.len();
            state.counters.record_evicted(dropped);
        }

        let removed = before - state.entries.len();
        info!(
            removed,
            remaining = state.entries.len(),
            aggressive,
            "Fog cache optimized"
        );
        removed
    }

    pub fn get_stats(&self) -> FogCacheStats {
        let state = self.lock();
        let memory_usage = state.entries.values().map(|e| e.estimated_bytes).sum();
        state.counters.snapshot(state.entries.len(), memory_usage)
    }

    pub fn reset_stats(&self) {
        self.lock().counters = Counters::default();
    }

    /// Removes every entry. Statistics are kept.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(&self, bounds: &ViewportBounds, fingerprint: &str, is_intermediate: bool) -> CacheKey {
        CacheKey::new(bounds, fingerprint, is_intermediate, self.config.coordinate_precision())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FogCache {
    fn default() -> Self {
        Self::new(FogCacheConfig::default())
    }
}

impl std::fmt::Debug for FogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FogCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

/// Copy of `result` with every fog coordinate rounded to `precision` decimals.
fn compress(result: &FogResult, precision: u32) -> FogResult {
    let mut compressed = result.clone();
    for feature in &mut compressed.fog_geojson.features {
        round_feature(feature, precision);
    }
    compressed
}

fn round_feature(feature: &mut Feature, precision: u32) {
    let Some(geometry) = feature.geometry.as_mut() else {
        return;
    };
    let value = match &geometry.value {
        Value::Polygon(rings) => Value::Polygon(round_rings(rings, precision)),
        Value::MultiPolygon(polygons) => Value::MultiPolygon(
            polygons
                .iter()
                .map(|rings| round_rings(rings, precision))
                .collect(),
        ),
        _ => return,
    };
    *geometry = Geometry::new(value);
}

fn round_rings(rings: &[Vec<Vec<f64>>], precision: u32) -> Vec<Vec<Vec<f64>>> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|position| position.iter().map(|v| round_coordinate(*v, precision)).collect())
                .collect()
        })
        .collect()
}

fn estimate_bytes(result: &FogResult) -> usize {
    let vertices: usize = result.fog_geojson.features.iter().map(vertex_count).sum();
    let messages: usize = result
        .errors
        .iter()
        .chain(result.warnings.iter())
        .map(String::len)
        .sum();
    ENTRY_OVERHEAD_BYTES + vertices * POSITION_BYTES + messages
}
