//! Fog polygon construction and the fallback chain.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use geojson::{Feature, FeatureCollection};

use super::result::{
    feature_collection, FallbackStrategy, FogOptions, FogResult, OperationType, PerformanceMetrics,
    PerformanceTier,
};
use crate::coord::ViewportBounds;
use crate::error::FogError;
use crate::geometry::{bounding_box, complexity, difference, rectangle_feature};
use crate::log::{Logger, NoOpLogger};
use crate::{log_debug, log_error, log_warn};

/// World fog ring, kept as literal data so the last fallback has nothing to compute.
const EMERGENCY_WORLD_RING: [[f64; 2]; 5] = [
    [-180.0, -90.0],
    [180.0, -90.0],
    [180.0, 90.0],
    [-180.0, 90.0],
    [-180.0, -90.0],
];

/// A polygon covering the whole valid coordinate range.
pub fn world_fog() -> Feature {
    rectangle_feature(&ViewportBounds::world())
}

/// The viewport rectangle as a fog polygon.
///
/// # Errors
///
/// Returns [`FogError::InvalidBounds`] for inverted, non-finite or out of
/// range bounds.
pub fn viewport_fog(bounds: &ViewportBounds) -> Result<Feature, FogError> {
    bounds.validate()?;
    Ok(rectangle_feature(bounds))
}

/// Fog calculation engine.
///
/// Stateless apart from its logger. Every entry point returns a [`FogResult`];
/// failures end up in `errors` and in the metrics flags, never as a panic or
/// an `Err`.
pub struct FogEngine {
    logger: Arc<dyn Logger>,
}

/// Accumulates a result while a calculation runs.
struct Draft {
    started: Instant,
    operation: OperationType,
    errors: Vec<String>,
    warnings: Vec<String>,
    had_errors: bool,
    fallback_used: bool,
}

impl Draft {
    fn new(operation: OperationType) -> Self {
        Self {
            started: Instant::now(),
            operation,
            errors: Vec::new(),
            warnings: Vec::new(),
            had_errors: false,
            fallback_used: false,
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.had_errors = true;
        self.errors.push(message.into());
    }

    fn finish(self, fog: Option<Feature>) -> FogResult {
        let elapsed = self.started.elapsed();
        let execution_time_ms = elapsed.as_secs_f64() * 1000.0;
        FogResult {
            performance_metrics: PerformanceMetrics {
                geometry_complexity: fog.as_ref().map(complexity).unwrap_or_default(),
                operation_type: self.operation,
                had_errors: self.had_errors,
                fallback_used: self.fallback_used,
                execution_time_ms,
                performance_tier: PerformanceTier::from_duration(elapsed),
            },
            fog_geojson: feature_collection(fog),
            calculation_time_ms: execution_time_ms,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

impl FogEngine {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Precise fog for the viewport: viewport minus revealed area.
    ///
    /// - no viewport bounds in `options`: error result with no fog
    /// - no revealed area: the whole viewport is fog
    /// - revealed extent misses the viewport (with viewport optimization on):
    ///   the whole viewport is fog, plus a warning
    /// - revealed area covers the viewport: no fog features
    pub fn calculate_viewport_fog(&self, revealed: Option<&Feature>, options: &FogOptions) -> FogResult {
        let mut draft = Draft::new(OperationType::Viewport);

        let Some(bounds) = options.viewport_bounds else {
            draft.error("viewport bounds are required for viewport fog");
            log_warn!(self.logger, "Viewport fog requested without bounds");
            return draft.finish(None);
        };

        let viewport = match viewport_fog(&bounds) {
            Ok(feature) => feature,
            Err(e) => {
                log_warn!(self.logger, "Viewport fog rejected: {}", e);
                draft.error(e.to_string());
                return draft.finish(None);
            }
        };

        let Some(revealed) = revealed else {
            return draft.finish(Some(viewport));
        };

        if options.use_viewport_optimization {
            let touches = bounding_box(revealed).is_some_and(|extent| extent.intersects(&bounds));
            if !touches {
                draft
                    .warnings
                    .push("revealed areas do not intersect the viewport".to_string());
                return draft.finish(Some(viewport));
            }
        }

        let outcome = difference(&viewport, revealed);
        draft.had_errors |= outcome.metrics.had_errors;
        draft.fallback_used |= outcome.metrics.fallback_used;
        draft.errors.extend(outcome.errors);
        draft.warnings.extend(outcome.warnings);

        log_debug!(
            self.logger,
            "Viewport fog computed in {:?} (fog={}, errors={})",
            outcome.metrics.execution_time,
            outcome.result.is_some(),
            draft.errors.len()
        );
        draft.finish(outcome.result)
    }

    /// Degraded fog that always succeeds: the viewport rectangle, or the
    /// world when bounds are missing or invalid.
    pub fn calculate_simplified_fog(&self, bounds: Option<ViewportBounds>) -> FogResult {
        let Some(bounds) = bounds else {
            let mut draft = Draft::new(OperationType::World);
            draft.fallback_used = true;
            return draft.finish(Some(world_fog()));
        };

        match viewport_fog(&bounds) {
            Ok(viewport) => {
                let mut draft = Draft::new(OperationType::Viewport);
                draft.fallback_used = true;
                draft.finish(Some(viewport))
            }
            Err(e) => {
                log_warn!(self.logger, "Simplified fog using world fog: {}", e);
                let mut draft = Draft::new(OperationType::World);
                draft.fallback_used = true;
                draft.error(e.to_string());
                draft.finish(Some(world_fog()))
            }
        }
    }

    /// Precise fog with the fallback chain applied on failure.
    ///
    /// The primary result counts as failed when it reports errors or panics.
    /// Depending on `options.fallback_strategy` the chain continues with
    /// simplified viewport fog, then world fog, then a constant world polygon.
    /// Errors and warnings of every attempted step are carried into the
    /// returned result.
    pub fn create_fog_with_fallback(&self, revealed: Option<&Feature>, options: &FogOptions) -> FogResult {
        let started = Instant::now();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        match guarded("viewport fog", || self.calculate_viewport_fog(revealed, options)) {
            Ok(result) if !result.had_errors() => return result,
            Ok(result) if options.fallback_strategy == FallbackStrategy::None => return result,
            Ok(result) => {
                errors.extend(result.errors);
                warnings.extend(result.warnings);
            }
            Err(e) => {
                log_error!(self.logger, "Viewport fog panicked: {}", e);
                errors.push(e.to_string());
                if options.fallback_strategy == FallbackStrategy::None {
                    let mut draft = Draft::new(OperationType::Viewport);
                    draft.errors = errors;
                    draft.had_errors = true;
                    return draft.finish(None);
                }
            }
        }

        let mut steps: Vec<(&'static str, Box<dyn Fn() -> FogResult + '_>)> = Vec::new();
        if options.fallback_strategy == FallbackStrategy::Viewport {
            steps.push((
                "simplified viewport fog",
                Box::new(|| self.calculate_simplified_fog(options.viewport_bounds)),
            ));
        }
        steps.push(("world fog", Box::new(|| self.calculate_simplified_fog(None))));

        for (name, step) in steps {
            match guarded(name, step) {
                Ok(mut fallback) => {
                    log_warn!(self.logger, "Fog calculation fell back to {}", name);
                    errors.append(&mut fallback.errors);
                    warnings.append(&mut fallback.warnings);
                    warnings.push(format!("fell back to {}", name));
                    fallback.errors = errors;
                    fallback.warnings = warnings;
                    fallback.performance_metrics.had_errors = true;
                    fallback.performance_metrics.fallback_used = true;
                    fallback.calculation_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                    return fallback;
                }
                Err(e) => {
                    log_error!(self.logger, "Fallback {} panicked: {}", name, e);
                    errors.push(e.to_string());
                }
            }
        }

        warnings.push("fell back to emergency world fog".to_string());
        emergency_fog(started, errors, warnings)
    }

    /// Fog for display.
    ///
    /// While the viewport is moving the boolean operation is skipped and a
    /// stable rectangle is returned instead, so the overlay does not flicker
    /// and no work is spent on positions that are about to change.
    pub fn create_fog_features(
        &self,
        revealed: Option<&Feature>,
        options: &FogOptions,
        is_viewport_changing: bool,
    ) -> FogResult {
        if is_viewport_changing {
            log_debug!(self.logger, "Viewport changing, deferring precise fog");
            return self.calculate_simplified_fog(options.viewport_bounds);
        }
        self.create_fog_with_fallback(revealed, options)
    }
}

impl Default for FogEngine {
    fn default() -> Self {
        Self::new(Arc::new(NoOpLogger))
    }
}

impl std::fmt::Debug for FogEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FogEngine").finish_non_exhaustive()
    }
}

fn emergency_fog(started: Instant, errors: Vec<String>, warnings: Vec<String>) -> FogResult {
    let ring = EMERGENCY_WORLD_RING.iter().map(|p| p.to_vec()).collect();
    let feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::Polygon(vec![ring]))),
        id: None,
        properties: None,
        foreign_members: None,
    };
    let elapsed = started.elapsed();
    FogResult {
        fog_geojson: FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        calculation_time_ms: elapsed.as_secs_f64() * 1000.0,
        performance_metrics: PerformanceMetrics {
            geometry_complexity: Default::default(),
            operation_type: OperationType::World,
            had_errors: true,
            fallback_used: true,
            execution_time_ms: elapsed.as_secs_f64() * 1000.0,
            performance_tier: PerformanceTier::from_duration(elapsed),
        },
        errors,
        warnings,
    }
}

fn guarded<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, FogError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| FogError::from_panic(operation, payload))
}
