//! Configuration, query options and result types for the spatial index.

use std::time::Duration;

use geojson::Feature;
use serde::{Deserialize, Serialize};

use crate::coord::ViewportBounds;

/// Default query buffer around the viewport in degrees (~1 km).
pub const DEFAULT_BUFFER_DISTANCE: f64 = 0.01;

/// Default minimum on-screen size (bbox diagonal in pixels) kept under LOD.
pub const DEFAULT_LOD_MIN_PIXELS: f64 = 2.0;

/// Default memory budget for the index (64 MiB).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 64 * 1024 * 1024;

/// Default per-feature memory above which cleanup is recommended (64 KiB).
pub const DEFAULT_MEMORY_PER_FEATURE_THRESHOLD: usize = 64 * 1024;

/// Default share of least recently touched entries dropped by a gentle optimize.
pub const DEFAULT_GENTLE_REMOVAL_FRACTION: f64 = 0.25;

/// Default access count below which an aggressive optimize drops an entry.
pub const DEFAULT_MIN_ACCESS_COUNT: u64 = 2;

/// Fraction of the memory budget above which cleanup is recommended.
pub const CLEANUP_RECOMMENDED_RATIO: f64 = 0.75;

/// Spatial index configuration.
///
/// # Example
///
/// ```
/// use fogmap::spatial::SpatialIndexConfig;
///
/// let config = SpatialIndexConfig::new()
///     .with_buffer_distance(0.05)
///     .with_lod_min_pixels(4.0);
/// assert_eq!(config.buffer_distance(), 0.05);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialIndexConfig {
    buffer_distance: f64,
    lod_min_pixels: f64,
    max_memory_bytes: usize,
    memory_per_feature_threshold: usize,
    gentle_removal_fraction: f64,
    min_access_count: u64,
}

impl SpatialIndexConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default buffer added around query bounds, in degrees.
    pub fn with_buffer_distance(mut self, degrees: f64) -> Self {
        self.buffer_distance = degrees.max(0.0);
        self
    }

    /// Set the minimum bbox diagonal, in screen pixels, kept under level of detail.
    pub fn with_lod_min_pixels(mut self, pixels: f64) -> Self {
        self.lod_min_pixels = pixels.max(0.0);
        self
    }

    /// Set the total memory budget in bytes.
    pub fn with_max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Set the per-feature memory threshold in bytes.
    pub fn with_memory_per_feature_threshold(mut self, bytes: usize) -> Self {
        self.memory_per_feature_threshold = bytes;
        self
    }

    /// Set the fraction (0.0-1.0) of entries dropped by a gentle optimize.
    pub fn with_gentle_removal_fraction(mut self, fraction: f64) -> Self {
        self.gentle_removal_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Set the access count below which an aggressive optimize drops entries.
    pub fn with_min_access_count(mut self, count: u64) -> Self {
        self.min_access_count = count;
        self
    }

    pub fn buffer_distance(&self) -> f64 {
        self.buffer_distance
    }

    pub fn lod_min_pixels(&self) -> f64 {
        self.lod_min_pixels
    }

    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_bytes
    }

    pub fn memory_per_feature_threshold(&self) -> usize {
        self.memory_per_feature_threshold
    }

    pub fn gentle_removal_fraction(&self) -> f64 {
        self.gentle_removal_fraction
    }

    pub fn min_access_count(&self) -> u64 {
        self.min_access_count
    }
}

impl Default for SpatialIndexConfig {
    fn default() -> Self {
        Self {
            buffer_distance: DEFAULT_BUFFER_DISTANCE,
            lod_min_pixels: DEFAULT_LOD_MIN_PIXELS,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            memory_per_feature_threshold: DEFAULT_MEMORY_PER_FEATURE_THRESHOLD,
            gentle_removal_fraction: DEFAULT_GENTLE_REMOVAL_FRACTION,
            min_access_count: DEFAULT_MIN_ACCESS_COUNT,
        }
    }
}

/// Per-query options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Buffer in degrees; `None` uses the index default.
    pub buffer_distance: Option<f64>,
    /// Truncate results to this many features.
    pub max_results: Option<usize>,
    /// Drop features too small to matter at `zoom_level`.
    pub use_level_of_detail: bool,
    /// Map zoom level (fractional).
    pub zoom_level: f64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            buffer_distance: None,
            max_results: None,
            use_level_of_detail: false,
            zoom_level: 12.0,
        }
    }
}

impl QueryOptions {
    /// Options with level of detail enabled at the given zoom.
    pub fn at_zoom(zoom_level: f64) -> Self {
        Self {
            use_level_of_detail: true,
            zoom_level,
            ..Self::default()
        }
    }

    /// Limit the number of returned features.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Override the query buffer.
    pub fn with_buffer_distance(mut self, degrees: f64) -> Self {
        self.buffer_distance = Some(degrees);
        self
    }
}

/// Features found for a viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportQueryResult {
    pub features: Vec<Feature>,
    /// Candidates intersecting the buffered bounds, before LOD and truncation.
    pub total_features: usize,
    pub returned_features: usize,
    pub query_time: Duration,
    pub level_of_detail_applied: bool,
    /// The buffered bounds actually searched; `None` when the query was rejected.
    pub query_bounds: Option<ViewportBounds>,
}

impl ViewportQueryResult {
    pub(crate) fn empty(query_time: Duration) -> Self {
        Self {
            features: Vec::new(),
            total_features: 0,
            returned_features: 0,
            query_time,
            level_of_detail_applied: false,
            query_bounds: None,
        }
    }
}

/// Memory pressure verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRecommendation {
    Optimal,
    CleanupRecommended,
    CleanupRequired,
}

/// Estimated memory footprint of the index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub estimated_memory_usage: usize,
    pub feature_count: usize,
    /// Mean vertex count per feature.
    pub average_complexity: f64,
    pub memory_per_feature: f64,
    pub recommendation: MemoryRecommendation,
}

/// What [`SpatialIndex::optimize_memory`](super::SpatialIndex::optimize_memory) removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizationReport {
    pub removed: usize,
    pub remaining: usize,
}
