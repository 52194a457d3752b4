//! Polygon geometry: validation, repair and robust boolean operations.
//!
//! Revealed areas arrive from an external store and cannot be trusted, so the
//! pipeline is always validate → sanitize → operate:
//!
//! ```text
//! Feature ──► validate ──► sanitize ──► geo BooleanOps ──► validate ──► Feature
//!                │             │              │
//!                ▼             ▼              ▼
//!          ValidationReport   None      FogError (caught)
//! ```
//!
//! # Example
//!
//! ```
//! use fogmap::geometry::{difference, polygon_feature};
//!
//! let viewport = polygon_feature(vec![vec![
//!     vec![-1.0, -1.0], vec![2.0, -1.0], vec![2.0, 2.0], vec![-1.0, 2.0], vec![-1.0, -1.0],
//! ]]);
//! let revealed = polygon_feature(vec![vec![
//!     vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0], vec![0.0, 0.0],
//! ]]);
//!
//! let outcome = difference(&viewport, &revealed);
//! assert!(outcome.errors.is_empty());
//! assert!(outcome.result.is_some());
//! ```

mod boolean;
mod feature;
mod fingerprint;
mod sanitize;
mod validate;

pub use boolean::{difference, union, union_detailed, DifferenceOutcome, OperationMetrics, UnionOutcome};
pub use feature::{
    bounding_box, ensure_id, feature_id, from_multi_polygon, multi_polygon_feature, polygon_feature,
    polygon_sets, rectangle_feature, rings, to_multi_polygon, vertex_count, with_id, PolygonRings,
    Position, Ring, ID_PROPERTY,
};
pub use fingerprint::fingerprint;
pub use sanitize::sanitize;
pub use validate::{
    complexity, is_polygonal, is_valid, validate, validate_geojson, ComplexityLevel,
    GeometryComplexity, ValidationReport, DUPLICATE_TOLERANCE, HIGH_COMPLEXITY_MIN_VERTICES,
    LOW_COMPLEXITY_MAX_VERTICES, MIN_RING_POSITIONS,
};
