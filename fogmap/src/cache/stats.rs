//! Fog cache statistics.

use serde::Serialize;

/// Running counters, kept under the cache lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
    /// Sum of `calculation_time_ms` of every result served from cache.
    pub time_saved_ms: f64,
}

impl Counters {
    pub fn record_hit(&mut self, calculation_time_ms: f64) {
        self.hits += 1;
        self.time_saved_ms += calculation_time_ms;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    pub fn record_evicted(&mut self, count: usize) {
        self.evicted += count as u64;
    }

    pub fn snapshot(&self, total_entries: usize, memory_usage: usize) -> FogCacheStats {
        let lookups = self.hits + self.misses;
        FogCacheStats {
            total_entries,
            cache_hits: self.hits,
            cache_misses: self.misses,
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
            expired_entries: self.expired,
            evicted_entries: self.evicted,
            memory_usage,
            average_time_saved: if self.hits == 0 {
                0.0
            } else {
                self.time_saved_ms / self.hits as f64
            },
        }
    }
}

/// Point-in-time view of cache effectiveness.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FogCacheStats {
    pub total_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Hits over lookups (0.0 to 1.0).
    pub hit_ratio: f64,
    pub expired_entries: u64,
    pub evicted_entries: u64,
    /// Estimated bytes held by cached results.
    pub memory_usage: usize,
    /// Mean calculation time, in milliseconds, avoided per hit.
    pub average_time_saved: f64,
}

impl FogCacheStats {
    pub fn lookups(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }
}
