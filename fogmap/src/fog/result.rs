//! Fog calculation inputs and outputs.

use std::time::Duration;

use geojson::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};

use crate::coord::ViewportBounds;
use crate::geometry::GeometryComplexity;

/// Upper bound for the `Fast` tier (one 60 Hz frame).
pub const FAST_TIER_MAX: Duration = Duration::from_millis(16);

/// Upper bound for the `Moderate` tier.
pub const MODERATE_TIER_MAX: Duration = Duration::from_millis(100);

/// Which fog polygon the calculation was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    World,
    Viewport,
}

/// Coarse classification of calculation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Fast,
    Moderate,
    Slow,
}

impl PerformanceTier {
    pub fn from_duration(elapsed: Duration) -> Self {
        if elapsed < FAST_TIER_MAX {
            Self::Fast
        } else if elapsed < MODERATE_TIER_MAX {
            Self::Moderate
        } else {
            Self::Slow
        }
    }
}

/// What to fall back to when precise viewport fog cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    /// Plain viewport rectangle, then world fog.
    #[default]
    Viewport,
    /// World fog directly.
    World,
    /// Return the failed result unchanged.
    None,
}

/// Options for a fog calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogOptions {
    pub viewport_bounds: Option<ViewportBounds>,
    /// Skip the boolean operation when revealed areas cannot touch the viewport.
    pub use_viewport_optimization: bool,
    pub fallback_strategy: FallbackStrategy,
}

impl FogOptions {
    pub fn for_viewport(bounds: ViewportBounds) -> Self {
        Self {
            viewport_bounds: Some(bounds),
            ..Self::default()
        }
    }

    pub fn with_fallback_strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback_strategy = strategy;
        self
    }

    pub fn with_viewport_optimization(mut self, enabled: bool) -> Self {
        self.use_viewport_optimization = enabled;
        self
    }
}

impl Default for FogOptions {
    fn default() -> Self {
        Self {
            viewport_bounds: None,
            use_viewport_optimization: true,
            fallback_strategy: FallbackStrategy::default(),
        }
    }
}

/// How a fog result was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Complexity of the emitted fog geometry.
    pub geometry_complexity: GeometryComplexity,
    pub operation_type: OperationType,
    pub had_errors: bool,
    pub fallback_used: bool,
    pub execution_time_ms: f64,
    pub performance_tier: PerformanceTier,
}

/// A renderable fog calculation.
///
/// `fog_geojson` holds zero features (everything in view is revealed) or one
/// `Polygon`/`MultiPolygon` feature covering the unexplored area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FogResult {
    #[serde(rename = "fogGeoJSON")]
    pub fog_geojson: FeatureCollection,
    pub calculation_time_ms: f64,
    pub performance_metrics: PerformanceMetrics,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FogResult {
    /// The fog feature, if any area is unexplored.
    pub fn fog_feature(&self) -> Option<&Feature> {
        self.fog_geojson.features.first()
    }

    /// Whether the viewport is entirely revealed.
    pub fn is_clear(&self) -> bool {
        self.fog_geojson.features.is_empty()
    }

    pub fn had_errors(&self) -> bool {
        self.performance_metrics.had_errors
    }

    pub fn fallback_used(&self) -> bool {
        self.performance_metrics.fallback_used
    }
}

pub(crate) fn feature_collection(fog: Option<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: fog.into_iter().collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(PerformanceTier::from_duration(Duration::ZERO), PerformanceTier::Fast);
        assert_eq!(
            PerformanceTier::from_duration(Duration::from_millis(16)),
            PerformanceTier::Moderate
        );
        assert_eq!(
            PerformanceTier::from_duration(Duration::from_millis(99)),
            PerformanceTier::Moderate
        );
        assert_eq!(
            PerformanceTier::from_duration(Duration::from_millis(100)),
            PerformanceTier::Slow
        );
    }

    #[test]
    fn test_fallback_strategy_serde() {
        let strategy: FallbackStrategy = serde_json::from_str(r#""world""#).unwrap();
        assert_eq!(strategy, FallbackStrategy::World);
        assert_eq!(serde_json::to_string(&FallbackStrategy::None).unwrap(), r#""none""#);
    }

    #[test]
    fn test_default_options() {
        let options = FogOptions::default();
        assert!(options.viewport_bounds.is_none());
        assert!(options.use_viewport_optimization);
        assert_eq!(options.fallback_strategy, FallbackStrategy::Viewport);
    }

    #[test]
    fn test_empty_collection() {
        let collection = feature_collection(None);
        assert!(collection.features.is_empty());
    }
}
