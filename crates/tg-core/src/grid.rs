//! Deterministic spatial grid keys.
//!
//! A coordinate maps to cell index `round(v / resolution)`; the cell's
//! representative coordinate is `index * resolution`.  Keys are held as
//! integer pairs so hashing never depends on float formatting, and are
//! rendered as `"{lat:.6},{lng:.6}"` only at serialization time.
//!
//! Bucketing is Euclidean on degrees.  Cells are not equal-area; callers
//! needing true areas use [`cell_area_km2`].

use crate::geo::{GeoPoint, METRES_PER_DEG_LAT};
use crate::{CoreError, CoreResult};

/// Integer cell coordinates at some resolution.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct GridCell {
    pub lat_idx: i64,
    pub lng_idx: i64,
}

impl GridCell {
    #[inline]
    pub fn of(lat: f64, lng: f64, resolution: f64) -> Self {
        Self {
            lat_idx: (lat / resolution).round() as i64,
            lng_idx: (lng / resolution).round() as i64,
        }
    }

    #[inline]
    pub fn of_point(p: GeoPoint, resolution: f64) -> Self {
        Self::of(p.lat, p.lng, resolution)
    }

    /// Representative coordinate `round(v/res)*res`.
    #[inline]
    pub fn center(self, resolution: f64) -> GeoPoint {
        GeoPoint::new(self.lat_idx as f64 * resolution, self.lng_idx as f64 * resolution)
    }

    /// Serialized key, e.g. `"36.651000,117.120000"`.
    pub fn key(self, resolution: f64) -> String {
        let c = self.center(resolution);
        format!("{:.6},{:.6}", c.lat, c.lng)
    }

    /// Inverse of [`GridCell::key`].
    pub fn parse_key(key: &str, resolution: f64) -> CoreResult<Self> {
        let (lat, lng) = key
            .split_once(',')
            .ok_or_else(|| CoreError::Parse(format!("grid key {key:?} has no comma")))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| CoreError::Parse(format!("bad latitude in grid key {key:?}")))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|_| CoreError::Parse(format!("bad longitude in grid key {key:?}")))?;
        Ok(Self::of(lat, lng, resolution))
    }
}

/// Reject resolutions that would make cell indices meaningless.
pub fn validate_resolution(resolution: f64) -> CoreResult<()> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidResolution(resolution))
    }
}

/// Stable text label for a resolution, used in index filenames
/// (`0.001` → `"0.001"`).
pub fn resolution_label(resolution: f64) -> String {
    format!("{resolution}")
}

/// Approximate area of one cell in km² at `lat`.
pub fn cell_area_km2(resolution: f64, lat: f64) -> f64 {
    let side_lat_km = resolution * METRES_PER_DEG_LAT / 1_000.0;
    let side_lng_km = side_lat_km * lat.to_radians().cos().abs();
    side_lat_km * side_lng_km
}
