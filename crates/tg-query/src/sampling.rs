//! Point-count reduction for oversized loads.
//!
//! Single-vehicle loads use uniform time-ordered subsampling that always
//! keeps the first and last fix.  Multi-vehicle loads are stratified by
//! vehicle with a per-vehicle floor so every vehicle keeps enough fixes for
//! trip and segment logic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tg_core::{TrajectoryPoint, VehicleId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingStrategy {
    Uniform,
    Stratified,
}

/// `target` evenly spaced indices over `0..n`, first and last included.
///
/// `floor(i·(n−1)/(target−1))`; returns all of `0..n` when `target >= n`.
pub fn uniform_indices(n: usize, target: usize) -> Vec<usize> {
    match target {
        _ if target >= n => (0..n).collect(),
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..target).map(|i| i * (n - 1) / (target - 1)).collect(),
    }
}

/// Uniformly subsample a time-ordered track.
pub fn uniform_sample(points: Vec<TrajectoryPoint>, target: usize) -> Vec<TrajectoryPoint> {
    if points.len() <= target {
        return points;
    }
    let keep = uniform_indices(points.len(), target);
    let mut slots: Vec<Option<TrajectoryPoint>> = points.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Per-vehicle quota: `max(min_per_vehicle, target / vehicles)`.
pub fn per_vehicle_quota(target: usize, vehicles: usize, min_per_vehicle: usize) -> usize {
    (target / vehicles.max(1)).max(min_per_vehicle)
}

/// Stratified sample of a time-ordered multi-vehicle point set.  Output is
/// time-ordered.  The total may exceed `target` when the per-vehicle floor
/// dominates.
pub fn stratified_sample(
    points: Vec<TrajectoryPoint>,
    target: usize,
    min_per_vehicle: usize,
) -> Vec<TrajectoryPoint> {
    let mut groups: BTreeMap<VehicleId, Vec<TrajectoryPoint>> = BTreeMap::new();
    for p in points {
        groups.entry(p.vehicle_id.clone()).or_default().push(p);
    }
    let quota = per_vehicle_quota(target, groups.len(), min_per_vehicle);

    let mut out: Vec<TrajectoryPoint> =
        groups.into_values().flat_map(|track| uniform_sample(track, quota)).collect();
    out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.vehicle_id.cmp(&b.vehicle_id)));
    out
}
