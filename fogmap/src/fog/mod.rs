//! Fog calculation engine.
//!
//! Turns a viewport and the revealed area inside it into the fog polygon to
//! draw. The precise path differences the viewport rectangle against the
//! revealed area; when that fails the engine walks a fallback chain that ends
//! in a constant world polygon, so callers always get something renderable.
//!
//! ```text
//! calculate_viewport_fog ──fail──► simplified viewport ──fail──► world ──fail──► emergency
//! ```
//!
//! # Example
//!
//! ```
//! use fogmap::coord::ViewportBounds;
//! use fogmap::fog::{FogEngine, FogOptions};
//!
//! let engine = FogEngine::default();
//! let options = FogOptions::for_viewport(ViewportBounds::new(-1.0, -1.0, 2.0, 2.0));
//! let result = engine.create_fog_with_fallback(None, &options);
//!
//! assert!(!result.had_errors());
//! assert_eq!(result.fog_geojson.features.len(), 1);
//! ```

mod engine;
mod result;

pub use engine::{viewport_fog, world_fog, FogEngine};
pub use result::{
    FallbackStrategy, FogOptions, FogResult, OperationType, PerformanceMetrics, PerformanceTier,
    FAST_TIER_MAX, MODERATE_TIER_MAX,
};
