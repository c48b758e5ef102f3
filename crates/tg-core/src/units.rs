//! Fixed-point ↔ physical unit conversion for the raw GPS feed.
//!
//! | Raw field | Raw unit          | Physical              |
//! |-----------|-------------------|-----------------------|
//! | `LAT/LON` | 1e-5 degree       | degrees               |
//! | `SPEED`   | cm/s              | km/h (× 0.036)        |
//! | `TFLAG`   | bit flag          | occupied when == SENTINEL |
//!
//! The `*_to_raw` inverses round to the nearest integer, so a raw → physical
//! → raw trip is exact for every integer input within plausible ranges.

/// Fixed-point divisor for latitude/longitude.
pub const COORD_SCALE: f64 = 1e5;

/// cm/s → km/h.
pub const SPEED_FACTOR: f64 = 0.036;

/// `TFLAG` value meaning "passenger on board".
pub const OCCUPIED_SENTINEL: i64 = 268_435_456;

#[inline]
pub fn coord_from_raw(raw: i64) -> f64 {
    raw as f64 / COORD_SCALE
}

#[inline]
pub fn coord_to_raw(deg: f64) -> i64 {
    (deg * COORD_SCALE).round() as i64
}

#[inline]
pub fn speed_from_raw(raw: i64) -> f64 {
    raw as f64 * SPEED_FACTOR
}

#[inline]
pub fn speed_to_raw(kmh: f64) -> i64 {
    (kmh / SPEED_FACTOR).round() as i64
}

#[inline]
pub fn occupied_from_raw(flag: i64) -> bool {
    flag == OCCUPIED_SENTINEL
}

#[inline]
pub fn occupied_to_raw(occupied: bool) -> i64 {
    if occupied { OCCUPIED_SENTINEL } else { 0 }
}
