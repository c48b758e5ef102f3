//! Order-derived congestion.
//!
//! Trips (from OD extraction) are binned by pickup location.  Per cell the
//! mean trip speed, order density per km², and orders per hour feed the
//! [`CompositeClassifier`].  Trip speed is haversine distance over duration,
//! so it already carries the great-circle convention.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use tg_core::grid::{cell_area_km2, validate_resolution};
use tg_core::{GeoPoint, GridCell};

use crate::congestion::{CompositeClassifier, CompositeInputs, CompositeScore};
use crate::RoadResult;

/// The parts of a trip the composite classifier needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrderSample {
    pub pickup: GeoPoint,
    pub pickup_time: i64,
    pub distance_km: f64,
    pub duration_secs: i64,
}

impl OrderSample {
    /// km/h, or `None` for zero-duration trips.
    pub fn speed_kmh(&self) -> Option<f64> {
        (self.duration_secs > 0).then(|| self.distance_km / (self.duration_secs as f64 / 3_600.0))
    }
}

/// One classified pickup cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderCongestionCell {
    pub center: GeoPoint,
    pub order_count: u32,
    pub inputs: CompositeInputs,
    pub score: CompositeScore,
}

/// Classify every pickup cell at `cell_deg`.
///
/// `observed_hours` is the length of the observation window; it is floored
/// at one hour so a short window does not inflate temporal density.
/// Cells are returned most-congested first, then by order count.
pub fn order_congestion(
    orders: &[OrderSample],
    cell_deg: f64,
    observed_hours: f64,
    classifier: &CompositeClassifier,
) -> RoadResult<Vec<OrderCongestionCell>> {
    validate_resolution(cell_deg)?;
    let hours = observed_hours.max(1.0);

    let mut cells: FxHashMap<GridCell, Vec<&OrderSample>> = FxHashMap::default();
    for o in orders {
        cells.entry(GridCell::of_point(o.pickup, cell_deg)).or_default().push(o);
    }

    let mut out: Vec<OrderCongestionCell> = cells
        .into_iter()
        .map(|(cell, group)| {
            let center = cell.center(cell_deg);
            let speeds: Vec<f64> = group.iter().filter_map(|o| o.speed_kmh()).collect();
            let avg_speed_kmh = if speeds.is_empty() {
                0.0
            } else {
                speeds.iter().sum::<f64>() / speeds.len() as f64
            };
            let n = group.len() as f64;
            let area = cell_area_km2(cell_deg, center.lat).max(f64::EPSILON);
            let inputs = CompositeInputs {
                avg_speed_kmh,
                spatial_density: n / area,
                temporal_density: n / hours,
            };
            OrderCongestionCell {
                center,
                order_count: group.len() as u32,
                inputs,
                score: classifier.score(&inputs),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.score
            .level
            .cmp(&a.score.level)
            .then_with(|| b.order_count.cmp(&a.order_count))
            .then_with(|| a.center.lat.total_cmp(&b.center.lat))
            .then_with(|| a.center.lng.total_cmp(&b.center.lng))
    });
    Ok(out)
}
