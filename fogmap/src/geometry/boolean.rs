//! Robust boolean operations on polygon features.
//!
//! Wraps `geo`'s [`BooleanOps`] so that a failing union or difference never
//! escapes as a panic. Every operand is validated and sanitized first, every
//! call into the geometry library runs under `catch_unwind`, and every failure
//! is reported as data in the returned outcome.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use geo::{BooleanOps, MultiPolygon};
use geojson::Feature;
use tracing::{debug, warn};

use super::feature::{from_multi_polygon, to_multi_polygon};
use super::sanitize::sanitize;
use super::validate::{complexity, validate, GeometryComplexity};
use crate::error::FogError;

/// Bookkeeping for a single boolean operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationMetrics {
    pub had_errors: bool,
    pub fallback_used: bool,
    pub execution_time: Duration,
    /// Complexity of the returned geometry (zero when there is none).
    pub complexity: GeometryComplexity,
}

/// Outcome of [`difference`].
///
/// `result == None` with empty `errors` means the subtrahend covers the
/// minuend completely.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferenceOutcome {
    pub result: Option<Feature>,
    pub metrics: OperationMetrics,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of [`union_detailed`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionOutcome {
    pub result: Option<Feature>,
    /// Operands dropped because they failed validation or sanitization.
    pub skipped: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Unions features, returning only the merged feature.
///
/// See [`union_detailed`] for the folding rules.
pub fn union(features: &[Feature]) -> Option<Feature> {
    union_detailed(features).result
}

/// Unions features pairwise.
///
/// - no input gives `None`
/// - a single input gives its sanitized form
/// - otherwise operands are folded left to right; an operand that fails
///   validation is skipped, and a fold step that fails keeps the last
///   successful accumulated result
pub fn union_detailed(features: &[Feature]) -> UnionOutcome {
    union_with(features, |a, b| a.union(b))
}

fn union_with(
    features: &[Feature],
    op: impl Fn(&MultiPolygon<f64>, &MultiPolygon<f64>) -> MultiPolygon<f64>,
) -> UnionOutcome {
    let mut outcome = UnionOutcome::default();

    match features {
        [] => return outcome,
        [single] => {
            outcome.result = sanitize(single);
            if outcome.result.is_none() {
                let reason = describe_rejection(single, "union operand 0");
                warn!(error = %reason, "Skipping invalid union operand");
                outcome.skipped = 1;
                outcome.warnings.push(reason);
            }
            return outcome;
        }
        _ => {}
    }

    let mut accumulated: Option<MultiPolygon<f64>> = None;
    for (i, feature) in features.iter().enumerate() {
        let operand = match prepare(feature, "union operand", i) {
            Ok(mp) => mp,
            Err(e) => {
                warn!(operand = i, error = %e, "Skipping invalid union operand");
                outcome.skipped += 1;
                outcome.warnings.push(e.to_string());
                continue;
            }
        };

        accumulated = match accumulated {
            None => Some(operand),
            Some(acc) => match guarded("union", || op(&acc, &operand)) {
                Ok(merged) => Some(merged),
                Err(e) => {
                    warn!(operand = i, error = %e, "Union step failed, keeping previous result");
                    outcome.errors.push(e.to_string());
                    Some(acc)
                }
            },
        };
    }

    if outcome.skipped > 0 {
        debug!(
            skipped = outcome.skipped,
            total = features.len(),
            "Union completed with skipped operands"
        );
    }

    outcome.result = accumulated
        .as_ref()
        .and_then(|mp| from_multi_polygon(mp, None))
        .and_then(|f| sanitize(&f));
    outcome
}

/// Computes `minuend - subtrahend`.
///
/// - both operands invalid after sanitizing: `result = None`, errors set
/// - full coverage: `result = None`, no errors
/// - geometry library failure: the sanitized minuend is returned with
///   `had_errors` and `fallback_used` set
pub fn difference(minuend: &Feature, subtrahend: &Feature) -> DifferenceOutcome {
    difference_with(minuend, subtrahend, |a, b| a.difference(b))
}

fn difference_with(
    minuend: &Feature,
    subtrahend: &Feature,
    op: impl Fn(&MultiPolygon<f64>, &MultiPolygon<f64>) -> MultiPolygon<f64>,
) -> DifferenceOutcome {
    let started = Instant::now();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let prepared = prepare(minuend, "minuend", 0)
        .and_then(|m| prepare(subtrahend, "subtrahend", 0).map(|s| (m, s)));
    let (m, s) = match prepared {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "Difference operands rejected");
            errors.push(e.to_string());
            return DifferenceOutcome {
                result: None,
                metrics: OperationMetrics {
                    had_errors: true,
                    fallback_used: false,
                    execution_time: started.elapsed(),
                    complexity: GeometryComplexity::default(),
                },
                errors,
                warnings,
            };
        }
    };

    let mut fallback_used = false;
    let result = match guarded("difference", || op(&m, &s)) {
        Ok(diff) if diff.0.is_empty() => None,
        Ok(diff) => {
            let raw = from_multi_polygon(&diff, None);
            match raw.as_ref().and_then(sanitize) {
                Some(feature) => Some(feature),
                None => {
                    // Only sub-precision slivers remain
                    warnings.push("difference left only degenerate slivers, treated as full coverage".to_string());
                    None
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Difference failed, falling back to minuend");
            errors.push(e.to_string());
            fallback_used = true;
            from_multi_polygon(&m, minuend.properties.clone())
        }
    };

    let metrics = OperationMetrics {
        had_errors: !errors.is_empty(),
        fallback_used,
        execution_time: started.elapsed(),
        complexity: result.as_ref().map(complexity).unwrap_or_default(),
    };

    DifferenceOutcome {
        result,
        metrics,
        errors,
        warnings,
    }
}

/// Validates and sanitizes an operand and converts it for `geo`.
fn prepare(feature: &Feature, role: &str, index: usize) -> Result<MultiPolygon<f64>, FogError> {
    let label = format!("{} {}", role, index);
    sanitize(feature)
        .and_then(|clean| to_multi_polygon(&clean))
        .ok_or_else(|| FogError::GeometryValidation(describe_rejection(feature, &label)))
}

fn describe_rejection(feature: &Feature, label: &str) -> String {
    let report = validate(feature);
    if report.errors.is_empty() {
        format!("{} collapsed during sanitization", label)
    } else {
        format!("{}: {}", label, report.errors.join("; "))
    }
}

/// Runs a geometry library call, converting a panic into an error.
fn guarded<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, FogError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| FogError::from_panic(operation, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::feature::{polygon_feature, rings, Ring};
    use geo::Area;
    use geojson::Value;

    fn square(x: f64, y: f64, size: f64) -> Feature {
        polygon_feature(vec![vec![
            vec![x, y],
            vec![x + size, y],
            vec![x + size, y + size],
            vec![x, y + size],
            vec![x, y],
        ]])
    }

    fn area(feature: &Feature) -> f64 {
        to_multi_polygon(feature).unwrap().unsigned_area()
    }

    fn broken() -> Feature {
        polygon_feature(vec![vec![vec![0.0, 0.0], vec![f64::NAN, 1.0]]])
    }

    #[test]
    fn test_union_empty_is_none() {
        assert!(union(&[]).is_none());
    }

    #[test]
    fn test_union_single_is_sanitized() {
        let mut ring: Ring = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
        ];
        let open = polygon_feature(vec![ring.clone()]);
        assert_eq!(union(&[open.clone()]), sanitize(&open));

        ring.push(vec![0.0, 0.0]);
        let closed = polygon_feature(vec![ring]);
        assert_eq!(union(&[closed.clone()]), Some(closed));
    }

    #[test]
    fn test_union_overlapping_squares() {
        let merged = union(&[square(0.0, 0.0, 1.0), square(0.5, 0.0, 1.0)]).unwrap();
        assert!((area(&merged) - 1.5).abs() < 1e-9);
        assert!(matches!(merged.geometry.unwrap().value, Value::Polygon(_)));
    }

    #[test]
    fn test_union_disjoint_squares_is_multipolygon() {
        let merged = union(&[square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]).unwrap();
        assert!(matches!(
            merged.geometry.as_ref().unwrap().value,
            Value::MultiPolygon(ref p) if p.len() == 2
        ));
        assert!((area(&merged) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_union_skips_invalid_operand() {
        let outcome = union_detailed(&[square(0.0, 0.0, 1.0), broken(), square(1.0, 0.0, 1.0)]);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.warnings.len(), 1);
        let merged = outcome.result.unwrap();
        assert!((area(&merged) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_union_all_invalid_is_none() {
        let outcome = union_detailed(&[broken(), broken()]);
        assert!(outcome.result.is_none());
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn test_union_single_invalid_is_skipped_with_warning() {
        let outcome = union_detailed(&[broken()]);
        assert!(outcome.result.is_none());
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_union_failed_step_keeps_accumulated() {
        let features = [square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0), square(0.5, 0.0, 1.0)];
        let calls = std::cell::Cell::new(0);
        let outcome = union_with(&features, |a, b| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                panic!("sweep line lost an edge");
            }
            a.union(b)
        });

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("sweep line lost an edge"));
        // The failed step dropped the second square only
        let merged = outcome.result.unwrap();
        assert!((area(&merged) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_difference_failure_falls_back_to_minuend() {
        let viewport = square(-1.0, -1.0, 3.0);
        let outcome = difference_with(&viewport, &square(0.0, 0.0, 1.0), |_, _| {
            panic!("non-noded intersection")
        });

        assert!(outcome.metrics.had_errors);
        assert!(outcome.metrics.fallback_used);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("non-noded intersection"));
        let fog = outcome.result.unwrap();
        assert!((area(&fog) - 9.0).abs() < 1e-9);
        assert_eq!(rings(&fog).count(), 1);
    }

    #[test]
    fn test_difference_square_with_hole() {
        let viewport = square(-1.0, -1.0, 3.0);
        let revealed = square(0.0, 0.0, 1.0);
        let outcome = difference(&viewport, &revealed);

        assert!(outcome.errors.is_empty());
        assert!(!outcome.metrics.had_errors);
        let fog = outcome.result.unwrap();
        match &fog.geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => assert_eq!(rings.len(), 2),
            other => panic!("expected polygon with hole, got {:?}", other),
        }
        assert!((area(&fog) - 8.0).abs() < 1e-9);
        assert_eq!(outcome.metrics.complexity.ring_count, 2);
    }

    #[test]
    fn test_difference_full_coverage_is_none_without_errors() {
        let viewport = square(0.25, 0.25, 0.5);
        let revealed = square(0.0, 0.0, 1.0);
        let outcome = difference(&viewport, &revealed);

        assert!(outcome.result.is_none());
        assert!(outcome.errors.is_empty());
        assert!(!outcome.metrics.had_errors);
        assert!(!outcome.metrics.fallback_used);
    }

    #[test]
    fn test_difference_disjoint_returns_minuend() {
        let viewport = square(10.0, 10.0, 1.0);
        let outcome = difference(&viewport, &square(0.0, 0.0, 1.0));
        let fog = outcome.result.unwrap();
        assert!((area(&fog) - 1.0).abs() < 1e-9);
        assert_eq!(rings(&fog).count(), 1);
    }

    #[test]
    fn test_difference_invalid_operand_reports_error() {
        let outcome = difference(&square(0.0, 0.0, 1.0), &broken());
        assert!(outcome.result.is_none());
        assert!(outcome.metrics.had_errors);
        assert!(!outcome.metrics.fallback_used);
        assert!(outcome.errors[0].contains("subtrahend"));
    }

    #[test]
    fn test_guarded_converts_panic() {
        let result: Result<(), FogError> = guarded("union", || panic!("boom"));
        assert_eq!(
            result.unwrap_err(),
            FogError::BooleanOperation {
                operation: "union",
                message: "boom".to_string()
            }
        );
    }
}
