//! Coordinate type definitions

use serde::{Deserialize, Serialize};

use crate::error::FogError;

/// Valid latitude range
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Rectangular lon/lat region currently visible on the map.
///
/// Construction is unchecked so that malformed bounds coming from a caller can
/// be represented and rejected with a typed error by [`ViewportBounds::validate`].
/// A viewport crossing the antimeridian (`min_lon > max_lon`) is treated as
/// invalid rather than unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    /// West edge in degrees
    pub min_lon: f64,
    /// South edge in degrees
    pub min_lat: f64,
    /// East edge in degrees
    pub max_lon: f64,
    /// North edge in degrees
    pub max_lat: f64,
}

impl ViewportBounds {
    /// Creates bounds from `[minLon, minLat, maxLon, maxLat]` components without validation.
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Creates bounds and validates them.
    pub fn try_new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, FogError> {
        let bounds = Self::new(min_lon, min_lat, max_lon, max_lat);
        bounds.validate()?;
        Ok(bounds)
    }

    /// The full valid coordinate range.
    pub const fn world() -> Self {
        Self::new(MIN_LON, MIN_LAT, MAX_LON, MAX_LAT)
    }

    /// Square bounds of `center ± radius` degrees, clamped to the valid range.
    ///
    /// `center` is `(lon, lat)`.
    pub fn from_center_radius(center: (f64, f64), radius: f64) -> Self {
        let (lon, lat) = center;
        Self::new(
            (lon - radius).max(MIN_LON),
            (lat - radius).max(MIN_LAT),
            (lon + radius).min(MAX_LON),
            (lat + radius).min(MAX_LAT),
        )
    }

    /// Checks ordering, finiteness and range.
    pub fn validate(&self) -> Result<(), FogError> {
        let values = [self.min_lon, self.min_lat, self.max_lon, self.max_lat];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(self.invalid("coordinates must be finite"));
        }
        if self.min_lon >= self.max_lon {
            return Err(self.invalid("min_lon must be less than max_lon"));
        }
        if self.min_lat >= self.max_lat {
            return Err(self.invalid("min_lat must be less than max_lat"));
        }
        if self.min_lon < MIN_LON || self.max_lon > MAX_LON {
            return Err(self.invalid("longitude outside [-180, 180]"));
        }
        if self.min_lat < MIN_LAT || self.max_lat > MAX_LAT {
            return Err(self.invalid("latitude outside [-90, 90]"));
        }
        Ok(())
    }

    /// Returns true if [`validate`](Self::validate) succeeds.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Grows the bounds by `buffer` degrees on every side, clamped to the valid range.
    pub fn expand(&self, buffer: f64) -> Self {
        Self::new(
            (self.min_lon - buffer).max(MIN_LON),
            (self.min_lat - buffer).max(MIN_LAT),
            (self.max_lon + buffer).min(MAX_LON),
            (self.max_lat + buffer).min(MAX_LAT),
        )
    }

    /// Returns true if the two rectangles share any point (edges included).
    pub fn intersects(&self, other: &ViewportBounds) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// Closed 5-point exterior ring, counter-clockwise from the south-west corner.
    pub fn ring(&self) -> Vec<Vec<f64>> {
        vec![
            vec![self.min_lon, self.min_lat],
            vec![self.max_lon, self.min_lat],
            vec![self.max_lon, self.max_lat],
            vec![self.min_lon, self.max_lat],
            vec![self.min_lon, self.min_lat],
        ]
    }

    /// The bounds as `[minLon, minLat, maxLon, maxLat]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    fn invalid(&self, reason: &str) -> FogError {
        FogError::InvalidBounds {
            min_lon: self.min_lon,
            min_lat: self.min_lat,
            max_lon: self.max_lon,
            max_lat: self.max_lat,
            reason: reason.to_string(),
        }
    }
}

impl From<[f64; 4]> for ViewportBounds {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}
