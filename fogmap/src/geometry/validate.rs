//! Polygon feature validation.
//!
//! Every feature is checked here before any boolean operation touches it.
//! Validation never panics: problems are reported as human-readable entries in
//! a [`ValidationReport`], split into hard errors (the feature must not be
//! used) and warnings (usable, but worth cleaning up).

use geojson::{Feature, GeoJson, Value};
use serde::{Deserialize, Serialize};

use super::feature::{polygon_sets, PolygonRings, Ring};
use crate::coord::is_valid_position;

/// Minimum number of positions in a closed ring (triangle + closing point).
pub const MIN_RING_POSITIONS: usize = 4;

/// Tolerance in degrees under which consecutive positions count as duplicates.
pub const DUPLICATE_TOLERANCE: f64 = 1e-6;

/// Below this many vertices a geometry is [`ComplexityLevel::Low`].
pub const LOW_COMPLEXITY_MAX_VERTICES: usize = 100;

/// Above this many vertices a geometry is [`ComplexityLevel::High`].
pub const HIGH_COMPLEXITY_MIN_VERTICES: usize = 1000;

/// Coarse complexity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    /// Buckets a total vertex count.
    pub fn from_vertices(total_vertices: usize) -> Self {
        if total_vertices < LOW_COMPLEXITY_MAX_VERTICES {
            Self::Low
        } else if total_vertices > HIGH_COMPLEXITY_MIN_VERTICES {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// Vertex and ring statistics for a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryComplexity {
    pub total_vertices: usize,
    pub ring_count: usize,
    pub max_ring_vertices: usize,
    pub average_ring_vertices: f64,
    pub level: ComplexityLevel,
}

/// Result of validating a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// True when `errors` is empty.
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub complexity: GeometryComplexity,
}

impl ValidationReport {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>, complexity: GeometryComplexity) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            complexity,
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self::from_parts(vec![error.into()], Vec::new(), GeometryComplexity::default())
    }
}

/// Computes vertex and ring statistics of a polygonal feature.
///
/// Non-polygonal features report zero everywhere.
pub fn complexity(feature: &Feature) -> GeometryComplexity {
    let ring_sizes: Vec<usize> = super::feature::rings(feature).map(Vec::len).collect();
    let total_vertices: usize = ring_sizes.iter().sum();
    let ring_count = ring_sizes.len();
    let max_ring_vertices = ring_sizes.iter().copied().max().unwrap_or(0);
    let average_ring_vertices = if ring_count == 0 {
        0.0
    } else {
        total_vertices as f64 / ring_count as f64
    };

    GeometryComplexity {
        total_vertices,
        ring_count,
        max_ring_vertices,
        average_ring_vertices,
        level: ComplexityLevel::from_vertices(total_vertices),
    }
}

/// Validates arbitrary (possibly absent) GeoJSON input.
///
/// Rejects missing input and anything that is not a single `Feature`.
pub fn validate_geojson(input: Option<&GeoJson>) -> ValidationReport {
    match input {
        None => ValidationReport::rejected("input is null"),
        Some(GeoJson::Feature(feature)) => validate(feature),
        Some(GeoJson::Geometry(_)) => {
            ValidationReport::rejected("expected a Feature, found a bare Geometry")
        }
        Some(GeoJson::FeatureCollection(_)) => {
            ValidationReport::rejected("expected a Feature, found a FeatureCollection")
        }
    }
}

/// Validates a polygon or multipolygon feature.
pub fn validate(feature: &Feature) -> ValidationReport {
    let Some(geometry) = feature.geometry.as_ref() else {
        return ValidationReport::rejected("feature has no geometry");
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match &geometry.value {
        Value::Polygon(rings) => {
            check_polygon(rings, "polygon", &mut errors, &mut warnings);
        }
        Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                errors.push("multipolygon has no coordinates".to_string());
            }
            for (i, rings) in polygons.iter().enumerate() {
                check_polygon(rings, &format!("polygon {}", i), &mut errors, &mut warnings);
            }
        }
        other => {
            return ValidationReport::rejected(format!(
                "unsupported geometry type {}, expected Polygon or MultiPolygon",
                geometry_type_name(other)
            ));
        }
    }

    let complexity = complexity(feature);
    if complexity.level == ComplexityLevel::High {
        warnings.push(format!(
            "high geometry complexity: {} vertices in {} rings",
            complexity.total_vertices, complexity.ring_count
        ));
    }

    ValidationReport::from_parts(errors, warnings, complexity)
}

/// Returns true if the feature passes validation.
pub fn is_valid(feature: &Feature) -> bool {
    validate(feature).is_valid
}

/// Returns true if the feature is a polygon or multipolygon, whatever its coordinates.
pub fn is_polygonal(feature: &Feature) -> bool {
    polygon_sets(feature).is_some()
}

fn check_polygon(rings: &PolygonRings, label: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if rings.is_empty() {
        errors.push(format!("{} has no rings", label));
        return;
    }
    for (i, ring) in rings.iter().enumerate() {
        check_ring(ring, &format!("{} ring {}", label, i), errors, warnings);
    }
}

fn check_ring(ring: &Ring, label: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if ring.is_empty() {
        errors.push(format!("{} is empty", label));
        return;
    }
    if ring.len() < MIN_RING_POSITIONS {
        errors.push(format!(
            "{} has {} positions, at least {} required",
            label,
            ring.len(),
            MIN_RING_POSITIONS
        ));
    }

    let mut bad_positions = 0usize;
    for position in ring {
        if position.len() < 2 || !is_valid_position(position[0], position[1]) {
            bad_positions += 1;
        }
    }
    if bad_positions > 0 {
        errors.push(format!(
            "{} has {} non-finite or out-of-range positions",
            label, bad_positions
        ));
        return;
    }

    let first = &ring[0];
    let last = &ring[ring.len() - 1];
    if first[0] != last[0] || first[1] != last[1] {
        errors.push(format!("{} is not closed", label));
    }

    let duplicates = ring
        .windows(2)
        .filter(|w| within_tolerance(&w[0], &w[1]))
        .count();
    if duplicates > 0 {
        warnings.push(format!(
            "{} has {} consecutive duplicate positions",
            label, duplicates
        ));
    }
}

/// True if both axes differ by at most [`DUPLICATE_TOLERANCE`].
pub(crate) fn within_tolerance(a: &[f64], b: &[f64]) -> bool {
    (a[0] - b[0]).abs() <= DUPLICATE_TOLERANCE && (a[1] - b[1]).abs() <= DUPLICATE_TOLERANCE
}

fn geometry_type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::feature::{multi_polygon_feature, polygon_feature};
    use geojson::{FeatureCollection, Geometry};

    fn square_ring() -> Ring {
        vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
        ]
    }

    #[test]
    fn test_valid_polygon() {
        let report = validate(&polygon_feature(vec![square_ring()]));
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert_eq!(report.complexity.total_vertices, 5);
        assert_eq!(report.complexity.ring_count, 1);
        assert_eq!(report.complexity.level, ComplexityLevel::Low);
    }

    #[test]
    fn test_null_input_rejected() {
        let report = validate_geojson(None);
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["input is null".to_string()]);
    }

    #[test]
    fn test_non_feature_wrapper_rejected() {
        let collection = GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        });
        assert!(!validate_geojson(Some(&collection)).is_valid);

        let geometry = GeoJson::Geometry(Geometry::new(Value::Polygon(vec![square_ring()])));
        assert!(!validate_geojson(Some(&geometry)).is_valid);
    }

    #[test]
    fn test_feature_wrapper_accepted() {
        let input = GeoJson::Feature(polygon_feature(vec![square_ring()]));
        assert!(validate_geojson(Some(&input)).is_valid);
    }

    #[test]
    fn test_missing_geometry_rejected() {
        let mut feature = polygon_feature(vec![square_ring()]);
        feature.geometry = None;
        let report = validate(&feature);
        assert!(!report.is_valid);
        assert!(report.errors[0].contains("no geometry"));
    }

    #[test]
    fn test_wrong_geometry_type_rejected() {
        let mut feature = polygon_feature(vec![square_ring()]);
        feature.geometry = Some(Geometry::new(Value::LineString(square_ring())));
        let report = validate(&feature);
        assert!(!report.is_valid);
        assert!(report.errors[0].contains("LineString"));
    }

    #[test]
    fn test_empty_coordinates_rejected() {
        assert!(!is_valid(&polygon_feature(vec![])));
        assert!(!is_valid(&multi_polygon_feature(vec![])));
        assert!(!is_valid(&polygon_feature(vec![vec![]])));
    }

    #[test]
    fn test_unclosed_ring_rejected() {
        let mut ring = square_ring();
        ring.pop();
        ring.push(vec![0.0, 0.5]);
        let report = validate(&polygon_feature(vec![ring]));
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("not closed")));
    }

    #[test]
    fn test_short_ring_rejected() {
        let ring = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]];
        let report = validate(&polygon_feature(vec![ring]));
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("at least 4")));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut ring = square_ring();
        ring[1] = vec![f64::NAN, 0.0];
        assert!(!is_valid(&polygon_feature(vec![ring])));

        let mut ring = square_ring();
        ring[2] = vec![f64::INFINITY, 1.0];
        assert!(!is_valid(&polygon_feature(vec![ring])));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut ring = square_ring();
        ring[2] = vec![181.0, 1.0];
        let report = validate(&polygon_feature(vec![ring]));
        assert!(!report.is_valid);
        assert!(report.errors[0].contains("out-of-range"));
    }

    #[test]
    fn test_duplicate_positions_warn() {
        let mut ring = square_ring();
        ring.insert(1, vec![0.0000001, 0.0]);
        let report = validate(&polygon_feature(vec![ring]));
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_multipolygon_error_names_member() {
        let bad = vec![vec![vec![0.0, 0.0], vec![1.0, 1.0]]];
        let report = validate(&multi_polygon_feature(vec![vec![square_ring()], bad]));
        assert!(!report.is_valid);
        assert!(report.errors[0].starts_with("polygon 1 ring 0"));
    }

    #[test]
    fn test_complexity_levels() {
        assert_eq!(ComplexityLevel::from_vertices(10), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::from_vertices(500), ComplexityLevel::Medium);
        assert_eq!(ComplexityLevel::from_vertices(5000), ComplexityLevel::High);
    }

    #[test]
    fn test_complexity_with_hole() {
        let hole = vec![
            vec![0.25, 0.25],
            vec![0.75, 0.25],
            vec![0.75, 0.75],
            vec![0.25, 0.25],
        ];
        let stats = complexity(&polygon_feature(vec![square_ring(), hole]));
        assert_eq!(stats.total_vertices, 9);
        assert_eq!(stats.ring_count, 2);
        assert_eq!(stats.max_ring_vertices, 5);
        assert!((stats.average_ring_vertices - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_high_complexity_warns() {
        let n = 1200;
        let mut ring: Ring = (0..n)
            .map(|i| {
                let a = i as f64 / n as f64 * std::f64::consts::TAU;
                vec![a.cos(), a.sin()]
            })
            .collect();
        ring.push(ring[0].clone());
        let report = validate(&polygon_feature(vec![ring]));
        assert!(report.is_valid);
        assert_eq!(report.complexity.level, ComplexityLevel::High);
        assert!(report.warnings.iter().any(|w| w.contains("high geometry complexity")));
    }
}
