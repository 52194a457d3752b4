//! GeoJSON feature helpers.
//!
//! Revealed areas and fog are exchanged as GeoJSON `Feature`s whose geometry is
//! a `Polygon` or `MultiPolygon`. Boolean operations run on `geo` types, so this
//! module owns the conversions in both directions plus id and extent helpers.

use std::sync::atomic::{AtomicU64, Ordering};

use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::feature::Id;
use geojson::{Feature, Geometry, JsonObject, Value};

use crate::coord::ViewportBounds;

/// Property key holding a feature's stable identifier.
pub const ID_PROPERTY: &str = "id";

/// A GeoJSON position (`[lon, lat, ...]`).
pub type Position = Vec<f64>;

/// A ring of positions.
pub type Ring = Vec<Position>;

/// Polygon coordinates: exterior ring first, then holes.
pub type PolygonRings = Vec<Ring>;

static NEXT_GENERATED_ID: AtomicU64 = AtomicU64::new(1);

/// Builds a polygon feature from its rings.
pub fn polygon_feature(rings: PolygonRings) -> Feature {
    feature_from_value(Value::Polygon(rings))
}

/// Builds a multipolygon feature from polygon coordinate sets.
pub fn multi_polygon_feature(polygons: Vec<PolygonRings>) -> Feature {
    feature_from_value(Value::MultiPolygon(polygons))
}

/// Builds a polygon feature covering the given bounds.
pub fn rectangle_feature(bounds: &ViewportBounds) -> Feature {
    polygon_feature(vec![bounds.ring()])
}

fn feature_from_value(value: Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

/// Returns the feature's identifier from `id` or the `id` property.
pub fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => return Some(s.clone()),
        Some(Id::Number(n)) => return Some(n.to_string()),
        None => {}
    }
    match feature.property(ID_PROPERTY)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns a copy of the feature carrying `id` both as feature id and property.
pub fn with_id(feature: &Feature, id: &str) -> Feature {
    let mut out = feature.clone();
    out.id = Some(Id::String(id.to_string()));
    out.set_property(ID_PROPERTY, id);
    out
}

/// Returns the feature with an identifier, generating `revealed-<n>` if absent.
pub fn ensure_id(feature: &Feature) -> (String, Feature) {
    match feature_id(feature) {
        Some(id) => {
            let out = with_id(feature, &id);
            (id, out)
        }
        None => {
            let id = format!(
                "revealed-{}",
                NEXT_GENERATED_ID.fetch_add(1, Ordering::Relaxed)
            );
            let out = with_id(feature, &id);
            (id, out)
        }
    }
}

/// Returns the polygon coordinate sets of a polygonal feature.
///
/// A `Polygon` yields one set, a `MultiPolygon` one per member. Any other
/// geometry (or none) yields `None`.
pub fn polygon_sets(feature: &Feature) -> Option<Vec<&PolygonRings>> {
    match &feature.geometry.as_ref()?.value {
        Value::Polygon(rings) => Some(vec![rings]),
        Value::MultiPolygon(polygons) => Some(polygons.iter().collect()),
        _ => None,
    }
}

/// Iterates every ring of a polygonal feature.
pub fn rings(feature: &Feature) -> impl Iterator<Item = &Ring> {
    polygon_sets(feature)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|rings| rings.iter())
}

/// Total number of positions across all rings.
pub fn vertex_count(feature: &Feature) -> usize {
    rings(feature).map(Vec::len).sum()
}

/// Axis-aligned extent of all finite positions, or `None` if there are none.
pub fn bounding_box(feature: &Feature) -> Option<ViewportBounds> {
    let mut min_lon = f64::INFINITY;
    let mut min_lat = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut any = false;

    for position in rings(feature).flatten() {
        if position.len() < 2 || !position[0].is_finite() || !position[1].is_finite() {
            continue;
        }
        any = true;
        min_lon = min_lon.min(position[0]);
        min_lat = min_lat.min(position[1]);
        max_lon = max_lon.max(position[0]);
        max_lat = max_lat.max(position[1]);
    }

    any.then(|| ViewportBounds::new(min_lon, min_lat, max_lon, max_lat))
}

/// Converts a polygonal feature to a `geo` multipolygon.
pub fn to_multi_polygon(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let polygons = polygon_sets(feature)?
        .into_iter()
        .filter_map(|rings| rings_to_polygon(rings))
        .collect::<Vec<_>>();
    Some(MultiPolygon::new(polygons))
}

fn rings_to_polygon(rings: &PolygonRings) -> Option<Polygon<f64>> {
    let mut iter = rings.iter().map(ring_to_line_string);
    let exterior = iter.next()?;
    Some(Polygon::new(exterior, iter.collect()))
}

fn ring_to_line_string(ring: &Ring) -> LineString<f64> {
    LineString::new(
        ring.iter()
            .filter(|p| p.len() >= 2)
            .map(|p| Coord { x: p[0], y: p[1] })
            .collect(),
    )
}

/// Converts a `geo` multipolygon back to a feature.
///
/// One member becomes a `Polygon`, several a `MultiPolygon`. Returns `None`
/// for an empty multipolygon.
pub fn from_multi_polygon(
    multi_polygon: &MultiPolygon<f64>,
    properties: Option<JsonObject>,
) -> Option<Feature> {
    let mut polygons: Vec<PolygonRings> = multi_polygon
        .0
        .iter()
        .map(polygon_to_rings)
        .filter(|rings| !rings.is_empty())
        .collect();

    let mut feature = match polygons.len() {
        0 => return None,
        1 => polygon_feature(polygons.remove(0)),
        _ => multi_polygon_feature(polygons),
    };
    feature.properties = properties;
    Some(feature)
}

fn polygon_to_rings(polygon: &Polygon<f64>) -> PolygonRings {
    if polygon.exterior().0.is_empty() {
        return Vec::new();
    }
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .map(|ls| ls.coords().map(|c| vec![c.x, c.y]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Feature {
        polygon_feature(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
        ]])
    }

    #[test]
    fn test_feature_id_from_property() {
        let mut feature = unit_square();
        feature.set_property("id", "area-7");
        assert_eq!(feature_id(&feature).as_deref(), Some("area-7"));
    }

    #[test]
    fn test_feature_id_from_numeric_id() {
        let mut feature = unit_square();
        feature.id = Some(Id::Number(42.into()));
        assert_eq!(feature_id(&feature).as_deref(), Some("42"));
    }

    #[test]
    fn test_ensure_id_generates_when_missing() {
        let (id, feature) = ensure_id(&unit_square());
        assert!(id.starts_with("revealed-"));
        assert_eq!(feature_id(&feature), Some(id));
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let source = with_id(&unit_square(), "keep-me");
        let (id, _) = ensure_id(&source);
        assert_eq!(id, "keep-me");
    }

    #[test]
    fn test_bounding_box() {
        let bbox = bounding_box(&unit_square()).unwrap();
        assert_eq!(bbox.to_array(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_bounding_box_skips_non_finite() {
        let feature = polygon_feature(vec![vec![
            vec![0.0, 0.0],
            vec![f64::NAN, 5.0],
            vec![2.0, 3.0],
            vec![0.0, 0.0],
        ]]);
        let bbox = bounding_box(&feature).unwrap();
        assert_eq!(bbox.to_array(), [0.0, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vertex_count_multi_polygon() {
        let square = unit_square();
        let rings = polygon_sets(&square).unwrap()[0].clone();
        let multi = multi_polygon_feature(vec![rings.clone(), rings]);
        assert_eq!(vertex_count(&multi), 10);
    }

    #[test]
    fn test_geo_round_trip_keeps_single_polygon() {
        let mp = to_multi_polygon(&unit_square()).unwrap();
        assert_eq!(mp.0.len(), 1);
        let back = from_multi_polygon(&mp, None).unwrap();
        assert!(matches!(
            back.geometry.unwrap().value,
            Value::Polygon(ref rings) if rings.len() == 1 && rings[0].len() == 5
        ));
    }

    #[test]
    fn test_from_empty_multi_polygon() {
        assert!(from_multi_polygon(&MultiPolygon::new(vec![]), None).is_none());
    }

    #[test]
    fn test_non_polygonal_geometry_has_no_sets() {
        let mut feature = unit_square();
        feature.geometry = Some(Geometry::new(Value::Point(vec![0.0, 0.0])));
        assert!(polygon_sets(&feature).is_none());
        assert_eq!(vertex_count(&feature), 0);
    }
}
