//! Descriptive summaries over extracted trips.
//!
//! Temporal summaries key on trip start time shifted by the configured
//! local offset.  Standard deviation is the population form.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use tg_core::time::{hour_of_day, is_weekend, DAY_SECS};
use tg_core::{BoundingBox, VehicleId};

use crate::flow::{top_flows, FlowSummary};
use crate::trip::Trip;
use crate::{OdConfig, OdResult};

// ── Temporal ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalPatterns {
    /// `"HH:MM"` window start → trips starting in that window.
    pub time_window_distribution: BTreeMap<String, u32>,
    /// Index = hour of day.
    pub hourly_distribution: [u32; 24],
    pub weekday_trips: u32,
    pub weekend_trips: u32,
    pub total_trips: usize,
    pub time_window_minutes: u32,
}

/// `window_minutes` must be non-zero.
pub fn temporal_patterns(trips: &[Trip], window_minutes: u32, local_offset_secs: i64) -> TemporalPatterns {
    let window = i64::from(window_minutes.max(1));
    let mut out = TemporalPatterns {
        time_window_distribution: BTreeMap::new(),
        hourly_distribution: [0; 24],
        weekday_trips: 0,
        weekend_trips: 0,
        total_trips: trips.len(),
        time_window_minutes: window_minutes,
    };

    for t in trips {
        let local = t.start_time() + local_offset_secs;
        let minute_of_day = local.rem_euclid(DAY_SECS) / 60;
        let slot = minute_of_day / window * window;
        let label = format!("{:02}:{:02}", slot / 60, slot % 60);
        *out.time_window_distribution.entry(label).or_insert(0) += 1;

        out.hourly_distribution[usize::from(hour_of_day(local))] += 1;
        if is_weekend(local) {
            out.weekend_trips += 1;
        } else {
            out.weekday_trips += 1;
        }
    }
    out
}

// ── Spatial ───────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

impl DescriptiveStats {
    /// `None` for an empty slice.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        Some(Self { min: sorted[0], max: sorted[n - 1], mean, median, std: var.sqrt() })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialPatterns {
    pub bounds: BoundingBox,
    pub lat_range: f64,
    pub lng_range: f64,
    pub distance_km: DescriptiveStats,
    pub duration_secs: DescriptiveStats,
    pub unique_origins: usize,
    pub unique_destinations: usize,
}

/// `None` for no trips.
pub fn spatial_patterns(trips: &[Trip]) -> Option<SpatialPatterns> {
    let ends = trips.iter().flat_map(|t| [t.origin.position(), t.destination.position()]);
    let bounds = BoundingBox::from_points(ends)?;

    let distances: Vec<f64> = trips.iter().map(|t| t.distance_km).collect();
    let durations: Vec<f64> = trips.iter().map(|t| t.duration_secs as f64).collect();

    let exact = |lat: f64, lng: f64| (lat.to_bits(), lng.to_bits());
    let origins: FxHashSet<_> = trips.iter().map(|t| exact(t.origin.lat, t.origin.lng)).collect();
    let dests: FxHashSet<_> =
        trips.iter().map(|t| exact(t.destination.lat, t.destination.lng)).collect();

    Some(SpatialPatterns {
        bounds,
        lat_range: bounds.max_lat - bounds.min_lat,
        lng_range: bounds.max_lng - bounds.min_lng,
        distance_km: DescriptiveStats::of(&distances)?,
        duration_secs: DescriptiveStats::of(&durations)?,
        unique_origins: origins.len(),
        unique_destinations: dests.len(),
    })
}

// ── Combined ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OdStatistics {
    pub total_trips: usize,
    pub total_vehicles: usize,
    /// Absent when there are no trips.
    pub temporal: Option<TemporalPatterns>,
    pub spatial: Option<SpatialPatterns>,
    pub top_flows: Vec<FlowSummary>,
}

pub fn od_statistics(trips: &[Trip], cfg: &OdConfig) -> OdResult<OdStatistics> {
    let vehicles: FxHashSet<&VehicleId> = trips.iter().map(|t| &t.vehicle_id).collect();
    Ok(OdStatistics {
        total_trips: trips.len(),
        total_vehicles: vehicles.len(),
        temporal: (!trips.is_empty())
            .then(|| temporal_patterns(trips, cfg.time_window_minutes, cfg.local_offset_secs)),
        spatial: spatial_patterns(trips),
        top_flows: top_flows(trips, cfg.top_flow_precision_deg, cfg.top_flow_count)?,
    })
}
