//! The ingested trajectory point.

use crate::geo::GeoPoint;
use crate::ids::VehicleId;
use crate::time::HourBucket;
use crate::units;

/// Raw fixed-point fields exactly as they arrived in the feed.
///
/// Kept alongside the normalized values so partitions can be re-derived
/// without going back to the source files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawFix {
    pub lat: i64,
    pub lng: i64,
    pub speed: i64,
    pub occupancy: i64,
}

/// One GPS ping.  Immutable once ingested.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectoryPoint {
    pub vehicle_id: VehicleId,
    /// Unix seconds, UTC.
    pub timestamp: i64,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub occupied: bool,
    pub raw: RawFix,
}

/// Identity of a ping for duplicate suppression: `(vehicle, ts, lat, lng)`.
///
/// Uses the raw integer coordinates so hashing is exact.
pub type DedupKey = (VehicleId, i64, i64, i64);

impl TrajectoryPoint {
    /// Normalize a raw record.
    pub fn from_raw(vehicle_id: VehicleId, timestamp: i64, raw: RawFix) -> Self {
        Self {
            vehicle_id,
            timestamp,
            lat: units::coord_from_raw(raw.lat),
            lng: units::coord_from_raw(raw.lng),
            speed_kmh: units::speed_from_raw(raw.speed),
            occupied: units::occupied_from_raw(raw.occupancy),
            raw,
        }
    }

    /// Build a point from physical values; the raw fields are synthesized
    /// through the inverse conversions.
    pub fn new(
        vehicle_id: impl Into<VehicleId>,
        timestamp: i64,
        lat: f64,
        lng: f64,
        speed_kmh: f64,
        occupied: bool,
    ) -> Self {
        let raw = RawFix {
            lat: units::coord_to_raw(lat),
            lng: units::coord_to_raw(lng),
            speed: units::speed_to_raw(speed_kmh),
            occupancy: units::occupied_to_raw(occupied),
        };
        Self {
            vehicle_id: vehicle_id.into(),
            timestamp,
            lat,
            lng,
            speed_kmh,
            occupied,
            raw,
        }
    }

    #[inline]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    #[inline]
    pub fn bucket(&self) -> HourBucket {
        HourBucket::of(self.timestamp)
    }

    pub fn dedup_key(&self) -> DedupKey {
        (self.vehicle_id.clone(), self.timestamp, self.raw.lat, self.raw.lng)
    }
}
