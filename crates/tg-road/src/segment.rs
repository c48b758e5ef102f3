//! Road segments and road-type classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use tg_core::{BoundingBox, GeoPoint, SegmentId};

// ── RoadType ──────────────────────────────────────────────────────────────────

/// Functional class of a road.  Drives free-flow speed and capacity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Highway,
    Arterial,
    Urban,
    Local,
}

impl RoadType {
    pub const ALL: [RoadType; 4] =
        [RoadType::Highway, RoadType::Arterial, RoadType::Urban, RoadType::Local];

    pub fn as_str(self) -> &'static str {
        match self {
            RoadType::Highway => "highway",
            RoadType::Arterial => "arterial",
            RoadType::Urban => "urban",
            RoadType::Local => "local",
        }
    }

    /// Classify by segment length when no richer source exists.
    pub fn from_length_m(length_m: f64, t: &LengthThresholds) -> RoadType {
        if length_m > t.highway_m {
            RoadType::Highway
        } else if length_m > t.arterial_m {
            RoadType::Arterial
        } else if length_m > t.urban_m {
            RoadType::Urban
        } else {
            RoadType::Local
        }
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length cut-offs (metres, exclusive) for [`RoadType::from_length_m`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LengthThresholds {
    pub highway_m: f64,
    pub arterial_m: f64,
    pub urban_m: f64,
}

impl Default for LengthThresholds {
    fn default() -> Self {
        Self { highway_m: 1_000.0, arterial_m: 500.0, urban_m: 200.0 }
    }
}

/// One value per road type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadTypeTable<T> {
    pub highway: T,
    pub arterial: T,
    pub urban: T,
    pub local: T,
}

impl<T: Copy> RoadTypeTable<T> {
    #[inline]
    pub fn get(&self, road_type: RoadType) -> T {
        match road_type {
            RoadType::Highway => self.highway,
            RoadType::Arterial => self.arterial,
            RoadType::Urban => self.urban,
            RoadType::Local => self.local,
        }
    }
}

// ── RoadSegment ───────────────────────────────────────────────────────────────

/// A static road segment.  Built once from the network table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub length_km: f64,
    pub road_type: RoadType,
}

impl RoadSegment {
    pub fn name(&self) -> String {
        format!("Road_{}", self.id)
    }

    pub fn midpoint(&self) -> GeoPoint {
        GeoPoint::new((self.start.lat + self.end.lat) * 0.5, (self.start.lng + self.end.lng) * 0.5)
    }

    /// Endpoint box padded by `buffer_deg` on every side.
    pub fn buffered_bbox(&self, buffer_deg: f64) -> BoundingBox {
        let mut bb = BoundingBox::new(self.start.lat, self.start.lat, self.start.lng, self.start.lng);
        bb.include(self.end);
        bb.expanded(buffer_deg)
    }
}
