//! Geographic coordinate type and spatial utilities.
//!
//! Coordinates are `f64`.  Raw pings arrive as fixed-point integers at 1e-5
//! degree resolution (~1 m); `f32` would lose that precision after
//! normalization, so unlike a simulation-scale point type we keep doubles.
//!
//! Every threshold or filter decision that depends on distance goes through
//! [`GeoPoint::distance_m`] (haversine).  Degree-space arithmetic is reserved
//! for coarse grid bucketing and bounding-box pre-filters.

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Approximate metres per degree of latitude.  Used only to size degree-space
/// envelopes, never for threshold decisions.
pub const METRES_PER_DEG_LAT: f64 = 111_195.0;

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Haversine distance in kilometres.
    #[inline]
    pub fn distance_km(self, other: GeoPoint) -> f64 {
        self.distance_m(other) / 1_000.0
    }

    /// Degree-space box check.  Cheap rejection only; not a distance test.
    #[inline]
    pub fn within_bbox(self, center: GeoPoint, half_deg: f64) -> bool {
        (self.lat - center.lat).abs() <= half_deg
            && (self.lng - center.lng).abs() <= half_deg
    }

    /// `true` if the coordinate lies on the globe.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Degrees of longitude spanning `metres` at this latitude.
    pub fn lng_degrees_for(self, metres: f64) -> f64 {
        let cos = self.lat.to_radians().cos().abs().max(1e-6);
        metres / (METRES_PER_DEG_LAT * cos)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

// ── BoundingBox ───────────────────────────────────────────────────────────────

/// Axis-aligned lat/lng rectangle, inclusive on all edges.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self { min_lat, max_lat, min_lng, max_lng }
    }

    /// Smallest box covering every point, or `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = GeoPoint>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = Self::new(first.lat, first.lat, first.lng, first.lng);
        for p in iter {
            bb.include(p);
        }
        Some(bb)
    }

    /// Grow the box to contain `p`.
    pub fn include(&mut self, p: GeoPoint) {
        self.min_lat = self.min_lat.min(p.lat);
        self.max_lat = self.max_lat.max(p.lat);
        self.min_lng = self.min_lng.min(p.lng);
        self.max_lng = self.max_lng.max(p.lng);
    }

    /// Copy of the box padded by `deg` on every side.
    pub fn expanded(self, deg: f64) -> Self {
        Self {
            min_lat: self.min_lat - deg,
            max_lat: self.max_lat + deg,
            min_lng: self.min_lng - deg,
            max_lng: self.max_lng + deg,
        }
    }

    #[inline]
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat
            && p.lat <= self.max_lat
            && p.lng >= self.min_lng
            && p.lng <= self.max_lng
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) * 0.5,
            (self.min_lng + self.max_lng) * 0.5,
        )
    }
}
