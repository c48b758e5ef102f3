//! Traffic anomaly detection over a loaded point set.
//!
//! Four detectors run independently and their findings are merged:
//!
//! | Kind             | Raised when                                                     |
//! |------------------|-----------------------------------------------------------------|
//! | `LongStop`       | consecutive fixes within `stop_distance_deg` are more than `long_stop_secs` apart |
//! | `SpeedAnomaly`   | a non-zero reported speed is below `speed_low_kmh` or above `speed_high_kmh` |
//! | `ClusterAnomaly` | more than `cluster_vehicles` distinct vehicles share one grid cell and time window |
//! | `AbnormalRoute`  | a vehicle's path is longer than `detour_ratio` × its straight-line distance |
//!
//! Every finding carries a stable id.  Duplicate ids are dropped and the
//! rest come back newest first.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tg_core::grid::validate_resolution;
use tg_core::time::hour_of_day;
use tg_core::{GeoPoint, GridCell, TrajectoryPoint, VehicleId};

use crate::{QueryError, QueryResult};

/// Anomaly locations are aggregated at this resolution for `top_locations`.
const LOCATION_RESOLUTION_DEG: f64 = 0.001;
const TOP_LOCATIONS: usize = 5;
/// Anomaly heatmap cells saturate at this intensity.
const MAX_INTENSITY: f64 = 100.0;

// ── Thresholds ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyThresholds {
    pub long_stop_secs: i64,
    /// Euclidean, in degrees.
    pub stop_distance_deg: f64,
    pub speed_low_kmh: f64,
    pub speed_high_kmh: f64,
    pub detour_ratio: f64,
    /// Vehicles whose endpoints are closer than this are not checked for
    /// detours.
    pub min_detour_straight_km: f64,
    pub cluster_vehicles: usize,
    pub cluster_cell_deg: f64,
    pub cluster_window_secs: i64,
    pub heatmap_resolution: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            long_stop_secs: 300,
            stop_distance_deg: 0.0001,
            speed_low_kmh: 5.0,
            speed_high_kmh: 80.0,
            detour_ratio: 1.5,
            min_detour_straight_km: 0.1,
            cluster_vehicles: 50,
            cluster_cell_deg: 0.005,
            cluster_window_secs: 900,
            heatmap_resolution: 0.002,
        }
    }
}

impl AnomalyThresholds {
    pub fn validate(&self) -> QueryResult<()> {
        let fail = |msg: &str| Err(QueryError::Config(msg.to_string()));
        if self.long_stop_secs <= 0 || self.cluster_window_secs <= 0 {
            return fail("anomaly durations must be positive");
        }
        if !(self.stop_distance_deg >= 0.0) || !(self.min_detour_straight_km >= 0.0) {
            return fail("anomaly distances must be non-negative");
        }
        if !(self.speed_low_kmh < self.speed_high_kmh) {
            return fail("speed_low_kmh must be below speed_high_kmh");
        }
        if !(self.detour_ratio > 1.0) {
            return fail("detour_ratio must exceed 1");
        }
        validate_resolution(self.cluster_cell_deg)?;
        validate_resolution(self.heatmap_resolution)?;
        Ok(())
    }
}

// ── Findings ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    LongStop,
    SpeedAnomaly,
    ClusterAnomaly,
    AbnormalRoute,
}

impl AnomalyKind {
    pub const ALL: [Self; 4] = [Self::LongStop, Self::SpeedAnomaly, Self::ClusterAnomaly, Self::AbnormalRoute];
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// 1, 2, 3.
    pub fn score(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    fn of_stop(duration_secs: i64) -> Self {
        match duration_secs {
            d if d > 1_800 => Self::High,
            d if d > 600 => Self::Medium,
            _ => Self::Low,
        }
    }

    fn of_cluster(vehicles: usize) -> Self {
        match vehicles {
            n if n > 100 => Self::High,
            n if n > 70 => Self::Medium,
            _ => Self::Low,
        }
    }

    fn of_detour(ratio: f64) -> Self {
        if ratio > 3.0 {
            Self::High
        } else if ratio > 2.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedDirection {
    Low,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "detail", rename_all = "snake_case")]
pub enum AnomalyDetail {
    LongStop { duration_secs: i64 },
    Speed { speed_kmh: f64, direction: SpeedDirection },
    Cluster { vehicle_count: usize, window_start: i64 },
    Detour { path_km: f64, straight_km: f64, ratio: f64, end: GeoPoint },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub kind: AnomalyKind,
    /// Absent for cluster anomalies.
    pub vehicle_id: Option<VehicleId>,
    pub timestamp: i64,
    pub end_timestamp: Option<i64>,
    pub position: GeoPoint,
    pub severity: Severity,
    pub detail: AnomalyDetail,
}

// ── Detectors ─────────────────────────────────────────────────────────────────

fn tracks(points: &[TrajectoryPoint]) -> BTreeMap<&VehicleId, Vec<&TrajectoryPoint>> {
    let mut by_vehicle: BTreeMap<&VehicleId, Vec<&TrajectoryPoint>> = BTreeMap::new();
    for p in points {
        by_vehicle.entry(&p.vehicle_id).or_default().push(p);
    }
    for track in by_vehicle.values_mut() {
        track.sort_by_key(|p| p.timestamp);
    }
    by_vehicle
}

pub fn detect_long_stops(points: &[TrajectoryPoint], th: &AnomalyThresholds) -> Vec<Anomaly> {
    let mut out = Vec::new();
    for (vehicle, track) in tracks(points) {
        for w in track.windows(2) {
            let (a, b) = (w[0], w[1]);
            let gap = b.timestamp - a.timestamp;
            let moved = (b.lat - a.lat).hypot(b.lng - a.lng);
            if moved < th.stop_distance_deg && gap > th.long_stop_secs {
                out.push(Anomaly {
                    id: format!("long_stop_{vehicle}_{}", a.timestamp),
                    kind: AnomalyKind::LongStop,
                    vehicle_id: Some(vehicle.clone()),
                    timestamp: a.timestamp,
                    end_timestamp: Some(b.timestamp),
                    position: a.position(),
                    severity: Severity::of_stop(gap),
                    detail: AnomalyDetail::LongStop { duration_secs: gap },
                });
            }
        }
    }
    out
}

/// Zero and non-finite speeds are skipped.
pub fn detect_speed_anomalies(points: &[TrajectoryPoint], th: &AnomalyThresholds) -> Vec<Anomaly> {
    points
        .iter()
        .filter(|p| p.speed_kmh.is_finite() && p.speed_kmh > 0.0)
        .filter_map(|p| {
            let speed = p.speed_kmh;
            let (direction, severity) = if speed < th.speed_low_kmh {
                (SpeedDirection::Low, if speed < 10.0 { Severity::Medium } else { Severity::Low })
            } else if speed > th.speed_high_kmh {
                (SpeedDirection::High, if speed > 100.0 { Severity::High } else { Severity::Medium })
            } else {
                return None;
            };
            let tag = match direction {
                SpeedDirection::Low => "low",
                SpeedDirection::High => "high",
            };
            Some(Anomaly {
                id: format!("speed_{tag}_{}_{}", p.vehicle_id, p.timestamp),
                kind: AnomalyKind::SpeedAnomaly,
                vehicle_id: Some(p.vehicle_id.clone()),
                timestamp: p.timestamp,
                end_timestamp: None,
                position: p.position(),
                severity,
                detail: AnomalyDetail::Speed { speed_kmh: speed, direction },
            })
        })
        .collect()
}

pub fn detect_cluster_anomalies(points: &[TrajectoryPoint], th: &AnomalyThresholds) -> Vec<Anomaly> {
    struct Bin<'a> {
        vehicles: FxHashSet<&'a VehicleId>,
        ts_sum: i128,
        n: i128,
    }

    let window = th.cluster_window_secs as f64;
    let mut bins: FxHashMap<(i64, GridCell), Bin<'_>> = FxHashMap::default();
    for p in points {
        let w = (p.timestamp as f64 / window).round() as i64;
        let bin = bins.entry((w, GridCell::of(p.lat, p.lng, th.cluster_cell_deg))).or_insert_with(|| Bin {
            vehicles: FxHashSet::default(),
            ts_sum: 0,
            n: 0,
        });
        bin.vehicles.insert(&p.vehicle_id);
        bin.ts_sum += i128::from(p.timestamp);
        bin.n += 1;
    }

    let mut out: Vec<Anomaly> = bins
        .into_iter()
        .filter(|(_, bin)| bin.vehicles.len() > th.cluster_vehicles)
        .map(|((w, cell), bin)| {
            let window_start = w * th.cluster_window_secs;
            let count = bin.vehicles.len();
            Anomaly {
                id: format!("cluster_{window_start}_{}_{}", cell.lat_idx, cell.lng_idx),
                kind: AnomalyKind::ClusterAnomaly,
                vehicle_id: None,
                timestamp: (bin.ts_sum / bin.n) as i64,
                end_timestamp: None,
                position: cell.center(th.cluster_cell_deg),
                severity: Severity::of_cluster(count),
                detail: AnomalyDetail::Cluster { vehicle_count: count, window_start },
            }
        })
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// One check per vehicle over its whole trajectory in the range; needs at
/// least three fixes.
pub fn detect_abnormal_routes(points: &[TrajectoryPoint], th: &AnomalyThresholds) -> Vec<Anomaly> {
    let mut out = Vec::new();
    for (vehicle, track) in tracks(points) {
        let (Some(first), Some(last)) = (track.first(), track.last()) else {
            continue;
        };
        if track.len() < 3 {
            continue;
        }
        let straight_km = first.position().distance_km(last.position());
        if straight_km <= th.min_detour_straight_km {
            continue;
        }
        let path_km: f64 = track.windows(2).map(|w| w[0].position().distance_km(w[1].position())).sum();
        let ratio = path_km / straight_km;
        if ratio > th.detour_ratio {
            out.push(Anomaly {
                id: format!("detour_{vehicle}_{}", first.timestamp),
                kind: AnomalyKind::AbnormalRoute,
                vehicle_id: Some(vehicle.clone()),
                timestamp: first.timestamp,
                end_timestamp: Some(last.timestamp),
                position: first.position(),
                severity: Severity::of_detour(ratio),
                detail: AnomalyDetail::Detour { path_km, straight_km, ratio, end: last.position() },
            });
        }
    }
    out
}

/// Run the detectors named in `kinds` (all of them when empty), drop
/// duplicate ids, and order newest first.
pub fn detect_anomalies(points: &[TrajectoryPoint], kinds: &[AnomalyKind], th: &AnomalyThresholds) -> Vec<Anomaly> {
    let selected = |k: AnomalyKind| kinds.is_empty() || kinds.contains(&k);
    let mut found = Vec::new();
    for kind in AnomalyKind::ALL.into_iter().filter(|&k| selected(k)) {
        found.extend(match kind {
            AnomalyKind::LongStop => detect_long_stops(points, th),
            AnomalyKind::SpeedAnomaly => detect_speed_anomalies(points, th),
            AnomalyKind::ClusterAnomaly => detect_cluster_anomalies(points, th),
            AnomalyKind::AbnormalRoute => detect_abnormal_routes(points, th),
        });
    }
    let mut seen = FxHashSet::default();
    found.retain(|a| seen.insert(a.id.clone()));
    found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    found
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyLocation {
    pub lat: f64,
    pub lng: f64,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyStatistics {
    pub total_count: usize,
    pub by_kind: BTreeMap<AnomalyKind, usize>,
    pub by_severity: SeverityCounts,
    /// Anomalies per local hour of day.
    pub hourly_distribution: Vec<u64>,
    /// Busiest 0.001° cells, at most five.
    pub top_locations: Vec<AnomalyLocation>,
}

pub fn anomaly_statistics(anomalies: &[Anomaly], local_offset_secs: i64) -> AnomalyStatistics {
    let mut stats = AnomalyStatistics { hourly_distribution: vec![0; 24], ..AnomalyStatistics::default() };
    let mut locations: FxHashMap<GridCell, usize> = FxHashMap::default();
    for a in anomalies {
        *stats.by_kind.entry(a.kind).or_insert(0) += 1;
        match a.severity {
            Severity::High => stats.by_severity.high += 1,
            Severity::Medium => stats.by_severity.medium += 1,
            Severity::Low => stats.by_severity.low += 1,
        }
        stats.hourly_distribution[usize::from(hour_of_day(a.timestamp + local_offset_secs))] += 1;
        *locations.entry(GridCell::of_point(a.position, LOCATION_RESOLUTION_DEG)).or_insert(0) += 1;
    }
    stats.total_count = anomalies.len();

    let mut ranked: Vec<(GridCell, usize)> = locations.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stats.top_locations = ranked
        .into_iter()
        .take(TOP_LOCATIONS)
        .map(|(cell, count)| {
            let c = cell.center(LOCATION_RESOLUTION_DEG);
            AnomalyLocation { lat: c.lat, lng: c.lng, count }
        })
        .collect();
    stats
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyHeatCell {
    pub lat: f64,
    pub lng: f64,
    pub count: usize,
    /// `count × mean severity score`, capped at 100.
    pub intensity: f64,
}

/// Anomalies binned at `resolution`, busiest cell first.
pub fn anomaly_heatmap(anomalies: &[Anomaly], resolution: f64) -> Vec<AnomalyHeatCell> {
    let mut cells: FxHashMap<GridCell, (usize, u32)> = FxHashMap::default();
    for a in anomalies {
        let cell = cells.entry(GridCell::of_point(a.position, resolution)).or_insert((0, 0));
        cell.0 += 1;
        cell.1 += a.severity.score();
    }
    let mut ranked: Vec<(GridCell, (usize, u32))> = cells.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .map(|(cell, (count, score))| {
            let c = cell.center(resolution);
            AnomalyHeatCell { lat: c.lat, lng: c.lng, count, intensity: f64::from(score).min(MAX_INTENSITY) }
        })
        .collect()
}
