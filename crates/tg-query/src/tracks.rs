//! Per-vehicle tracks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tg_core::{TrajectoryPoint, VehicleId};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: i64,
    pub speed_kmh: f64,
    pub occupied: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleTrack {
    pub vehicle_id: VehicleId,
    pub points: Vec<TrackPoint>,
    pub start_time: i64,
    pub end_time: i64,
    /// Sum of haversine legs.
    pub distance_km: f64,
}

/// Group time-ordered points into tracks, keeping at most `max_vehicles`
/// vehicles (lowest ids first).  Returns whether vehicles were dropped.
pub fn build_tracks(points: &[TrajectoryPoint], max_vehicles: usize) -> (Vec<VehicleTrack>, bool) {
    let mut groups: BTreeMap<&VehicleId, Vec<&TrajectoryPoint>> = BTreeMap::new();
    for p in points {
        groups.entry(&p.vehicle_id).or_default().push(p);
    }
    let dropped = groups.len() > max_vehicles;

    let tracks = groups
        .into_iter()
        .take(max_vehicles)
        .filter_map(|(id, mut fixes)| {
            fixes.sort_by_key(|p| p.timestamp);
            let (first, last) = (fixes.first()?, fixes.last()?);
            let distance_km: f64 = fixes.windows(2).map(|w| w[0].position().distance_km(w[1].position())).sum();
            Some(VehicleTrack {
                vehicle_id: id.clone(),
                start_time: first.timestamp,
                end_time: last.timestamp,
                distance_km,
                points: fixes
                    .iter()
                    .map(|p| TrackPoint {
                        lat: p.lat,
                        lng: p.lng,
                        timestamp: p.timestamp,
                        speed_kmh: p.speed_kmh,
                        occupied: p.occupied,
                    })
                    .collect(),
            })
        })
        .collect();
    (tracks, dropped)
}
