//! Coordinate helpers module
//!
//! Provides viewport bounds, coordinate range checks and the small amount of
//! Web Mercator arithmetic needed to turn a zoom level into a ground size.

mod types;

pub use types::{ViewportBounds, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Tile size in pixels used for zoom-to-resolution conversion.
pub const TILE_SIZE_PX: f64 = 256.0;

/// Default number of decimal places kept for stored coordinates (~0.1 m).
pub const COORDINATE_PRECISION: u32 = 6;

/// Returns true if the position is finite and inside `[-180,180] × [-90,90]`.
#[inline]
pub fn is_valid_position(lon: f64, lat: f64) -> bool {
    lon.is_finite()
        && lat.is_finite()
        && (MIN_LON..=MAX_LON).contains(&lon)
        && (MIN_LAT..=MAX_LAT).contains(&lat)
}

/// Rounds a coordinate to `precision` decimal places.
///
/// Non-finite values are returned unchanged.
#[inline]
pub fn round_coordinate(value: f64, precision: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // Normalise -0.0 so rounded coordinates compare and hash consistently
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Degrees of longitude covered by one pixel at the given zoom level.
///
/// Zoom is fractional, as map cameras report it.
#[inline]
pub fn degrees_per_pixel(zoom: f64) -> f64 {
    360.0 / (TILE_SIZE_PX * 2f64.powf(zoom.max(0.0)))
}

/// Highest zoom level distinguished by [`zoom_bucket`].
pub const MAX_ZOOM_BUCKET: u8 = 24;

/// Snaps a fractional zoom up to the next whole level.
///
/// Rounding up keeps the finer of the two neighbouring detail levels.
/// Non-finite zooms map to level 0.
#[inline]
pub fn zoom_bucket(zoom: f64) -> u8 {
    if !zoom.is_finite() {
        return 0;
    }
    zoom.ceil().clamp(0.0, f64::from(MAX_ZOOM_BUCKET)) as u8
}
