//! Traffic overview over a loaded point set.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use tg_core::time::{hour_of_day, HOUR_SECS};
use tg_core::TrajectoryPoint;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficOverview {
    pub total_points: usize,
    pub total_vehicles: usize,
    /// Vehicles with at least one moving fix.
    pub active_vehicles: usize,
    pub occupied_points: usize,
    pub time_span_hours: f64,
    pub average_speed_kmh: f64,
    /// Points per local hour of day.
    pub hourly_distribution: Vec<u64>,
}

pub fn traffic_overview(points: &[TrajectoryPoint], local_offset_secs: i64) -> TrafficOverview {
    let mut hourly = vec![0u64; 24];
    let mut vehicles = FxHashSet::default();
    let mut active = FxHashSet::default();
    let (mut min_ts, mut max_ts) = (i64::MAX, i64::MIN);
    let mut speed_sum = 0.0;
    let mut occupied = 0;

    for p in points {
        vehicles.insert(&p.vehicle_id);
        if p.speed_kmh > 0.0 {
            active.insert(&p.vehicle_id);
        }
        if p.occupied {
            occupied += 1;
        }
        speed_sum += p.speed_kmh;
        min_ts = min_ts.min(p.timestamp);
        max_ts = max_ts.max(p.timestamp);
        hourly[usize::from(hour_of_day(p.timestamp + local_offset_secs))] += 1;
    }

    let n = points.len();
    TrafficOverview {
        total_points: n,
        total_vehicles: vehicles.len(),
        active_vehicles: active.len(),
        occupied_points: occupied,
        time_span_hours: if n > 0 { (max_ts - min_ts) as f64 / HOUR_SECS as f64 } else { 0.0 },
        average_speed_kmh: if n > 0 { speed_sum / n as f64 } else { 0.0 },
        hourly_distribution: hourly,
    }
}
