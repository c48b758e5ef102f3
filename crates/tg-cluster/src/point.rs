//! Clustering input points.

use serde::{Deserialize, Serialize};

use tg_core::GeoPoint;

use crate::error::invalid;
use crate::ClusterResult;

/// Label assigned to points that belong to no cluster.
pub const NOISE: i32 = -1;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl WeightedPoint {
    pub fn new(lat: f64, lng: f64, weight: f64) -> Self {
        Self { lat, lng, weight }
    }

    pub fn unit(lat: f64, lng: f64) -> Self {
        Self::new(lat, lng, 1.0)
    }

    #[inline]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// How many copies of this point a duplication-based weighting would
    /// create: `max(1, trunc(weight))`.
    #[inline]
    pub fn multiplicity(&self) -> u64 {
        (self.weight as u64).max(1)
    }
}

pub(crate) fn validate_points(points: &[WeightedPoint]) -> ClusterResult<()> {
    for (i, p) in points.iter().enumerate() {
        if !(p.lat.is_finite() && p.lng.is_finite()) {
            return Err(invalid("points", format!("point {i} has a non-finite coordinate")));
        }
        if !(p.weight.is_finite() && p.weight >= 0.0) {
            return Err(invalid("points", format!("point {i} has weight {}", p.weight)));
        }
    }
    Ok(())
}

/// Z-score each axis (population std; a constant axis is left centred).
pub(crate) fn standardize(points: &[WeightedPoint]) -> Vec<[f64; 2]> {
    let n = points.len().max(1) as f64;
    let mean_lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let mean_lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    let std = |f: fn(&WeightedPoint) -> f64, mean: f64| {
        let s = (points.iter().map(|p| (f(p) - mean).powi(2)).sum::<f64>() / n).sqrt();
        if s > 0.0 { s } else { 1.0 }
    };
    let (s_lat, s_lng) = (std(|p| p.lat, mean_lat), std(|p| p.lng, mean_lng));
    points.iter().map(|p| [(p.lat - mean_lat) / s_lat, (p.lng - mean_lng) / s_lng]).collect()
}

#[inline]
pub(crate) fn sq_dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}
