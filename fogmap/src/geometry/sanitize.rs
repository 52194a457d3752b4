//! Polygon feature repair.
//!
//! Sanitizing rounds every coordinate to 6 decimal places, collapses
//! consecutive positions closer than [`DUPLICATE_TOLERANCE`](super::validate::DUPLICATE_TOLERANCE), force-closes
//! open rings and drops rings that end up with fewer than
//! [`MIN_RING_POSITIONS`]. The cleaned feature is validated again and `None`
//! is returned if it still fails. Cleanup is repeated until a ring stops
//! changing, which makes the whole operation idempotent.

use geojson::{Feature, Geometry, Value};

use super::feature::{PolygonRings, Ring};
use super::validate::{validate, within_tolerance, MIN_RING_POSITIONS};
use crate::coord::{round_coordinate, COORDINATE_PRECISION};

/// Returns a repaired copy of the feature, or `None` if it cannot be repaired.
///
/// Properties and id are carried over unchanged. A stale `bbox` member is dropped.
pub fn sanitize(feature: &Feature) -> Option<Feature> {
    let geometry = feature.geometry.as_ref()?;

    let value = match &geometry.value {
        Value::Polygon(rings) => Value::Polygon(sanitize_polygon(rings)?),
        Value::MultiPolygon(polygons) => {
            let cleaned: Vec<PolygonRings> = polygons
                .iter()
                .map(|rings| sanitize_polygon(rings))
                .collect::<Option<Vec<_>>>()
                .map(|all| all.into_iter().filter(|rings| !rings.is_empty()).collect())?;
            if cleaned.is_empty() {
                return None;
            }
            Value::MultiPolygon(cleaned)
        }
        _ => return None,
    };

    let mut out = feature.clone();
    out.bbox = None;
    out.geometry = Some(Geometry::new(value));

    validate(&out).is_valid.then_some(out)
}

/// Cleans one polygon's rings.
///
/// Returns `None` when a coordinate is non-finite (not repairable), and an
/// empty set when the exterior ring degenerates.
fn sanitize_polygon(rings: &PolygonRings) -> Option<PolygonRings> {
    let mut cleaned = Vec::with_capacity(rings.len());
    for (i, ring) in rings.iter().enumerate() {
        match clean_ring(ring)? {
            Some(ring) => cleaned.push(ring),
            // Holes without their exterior mean nothing
            None if i == 0 => return Some(Vec::new()),
            None => {}
        }
    }
    Some(cleaned)
}

/// `None` for non-finite input, `Some(None)` for a ring that collapsed.
fn clean_ring(ring: &Ring) -> Option<Option<Ring>> {
    let mut points: Vec<[f64; 2]> = Vec::with_capacity(ring.len() + 1);
    for position in ring.iter().filter(|p| p.len() >= 2) {
        if !position[0].is_finite() || !position[1].is_finite() {
            return None;
        }
        points.push([
            round_coordinate(position[0], COORDINATE_PRECISION),
            round_coordinate(position[1], COORDINATE_PRECISION),
        ]);
    }

    // Each pass after the first can only shrink the ring, so this terminates.
    for _ in 0..=ring.len() + 1 {
        let next = cleanup_pass(&points);
        if next == points {
            break;
        }
        points = next;
    }

    if points.len() < MIN_RING_POSITIONS {
        return Some(None);
    }
    Some(Some(points.into_iter().map(|p| p.to_vec()).collect()))
}

fn cleanup_pass(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut out: Vec<[f64; 2]> = Vec::with_capacity(points.len() + 1);
    for &p in points {
        if let Some(last) = out.last() {
            if within_tolerance(last, &p) {
                continue;
            }
        }
        out.push(p);
    }

    if let (Some(&first), Some(&last)) = (out.first(), out.last()) {
        if out.len() > 1 && within_tolerance(&first, &last) {
            if let Some(tail) = out.last_mut() {
                *tail = first;
            }
        } else {
            out.push(first);
        }
    }
    out
}
