//! Spatial index over revealed areas.
//!
//! An R-tree keyed on feature bounding boxes answers "which revealed areas
//! touch this viewport" without scanning every polygon. Queries can apply a
//! level-of-detail filter that skips areas too small to see at the current
//! zoom, and the index tracks per-feature access so rarely used entries can be
//! dropped when memory gets tight.
//!
//! ```text
//! viewport ──► expand(buffer) ──► R-tree intersect ──► LOD filter ──► truncate
//! ```
//!
//! # Thread Safety
//!
//! - Tree access: `RwLock` (concurrent queries, exclusive mutation)
//! - Access statistics: `DashMap` (updated by queries under the read lock)

mod index;
mod types;

pub use index::SpatialIndex;
pub use types::{
    MemoryRecommendation, MemoryStats, OptimizationReport, QueryOptions, SpatialIndexConfig,
    ViewportQueryResult, CLEANUP_RECOMMENDED_RATIO, DEFAULT_BUFFER_DISTANCE,
    DEFAULT_GENTLE_REMOVAL_FRACTION, DEFAULT_LOD_MIN_PIXELS, DEFAULT_MAX_MEMORY_BYTES,
    DEFAULT_MEMORY_PER_FEATURE_THRESHOLD, DEFAULT_MIN_ACCESS_COUNT,
};
