//! Segment statistics, efficiency, bottlenecks, and network-level summaries.
//!
//! Everything here is a pure reduction over [`SegmentTrafficSample`]s.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tg_core::time::hour_of_day;
use tg_core::{SegmentId, TimeRange};

use crate::congestion::CongestionLevel;
use crate::config::BottleneckThresholds;
use crate::segment::RoadType;
use crate::traffic::SegmentTrafficSample;
use crate::RoadConfig;

/// Summary of one segment over a time range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentStatistics {
    pub segment_id: SegmentId,
    pub road_type: RoadType,
    pub time_range: TimeRange,
    pub samples: usize,
    /// Sum of per-window distinct vehicle counts.
    pub total_vehicles: u64,
    pub avg_speed: f64,
    pub speed_variance: f64,
    pub peak_hour_flow: f64,
    pub off_peak_flow: f64,
    /// Heavy/jam windows × window length.
    pub congestion_hours: f64,
    /// Observed: mean of the top 10% of window speeds.
    pub free_flow_speed: f64,
    pub capacity_utilization: f64,
    pub efficiency: EfficiencyScore,
}

/// The three 0–100 sub-scores and their mean.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyScore {
    pub speed: f64,
    pub flow: f64,
    pub congestion: f64,
    pub overall: f64,
}

impl EfficiencyScore {
    /// - speed: `avg / free_flow`, capped at 100
    /// - flow: `off_peak / max(peak, 1)`, capped at 100
    /// - congestion: `100 − congestion_hours / 24 × 100`, floored at 0
    pub fn compute(
        avg_speed: f64,
        free_flow_speed: f64,
        off_peak_flow: f64,
        peak_flow: f64,
        congestion_hours: f64,
    ) -> Self {
        let speed = if free_flow_speed > 0.0 {
            (avg_speed / free_flow_speed * 100.0).min(100.0)
        } else {
            0.0
        };
        let flow = (off_peak_flow / peak_flow.max(1.0) * 100.0).min(100.0);
        let congestion = (100.0 - congestion_hours / 24.0 * 100.0).max(0.0);
        Self { speed, flow, congestion, overall: (speed + flow + congestion) / 3.0 }
    }
}

/// Per-segment statistics for samples whose window starts inside `range`.
///
/// Segments with fewer than `config.min_samples` samples are skipped.
/// Output is sorted by segment id.
pub fn segment_statistics(
    samples: &[SegmentTrafficSample],
    range: TimeRange,
    config: &RoadConfig,
) -> Vec<SegmentStatistics> {
    let mut groups: FxHashMap<SegmentId, Vec<&SegmentTrafficSample>> = FxHashMap::default();
    for s in samples.iter().filter(|s| range.contains(s.window_start)) {
        groups.entry(s.segment_id).or_default().push(s);
    }

    let mut out: Vec<SegmentStatistics> = groups
        .into_iter()
        .filter(|(_, g)| g.len() >= config.min_samples.max(1))
        .map(|(id, g)| single_segment(id, &g, range, config))
        .collect();
    out.sort_by_key(|s| s.segment_id);
    debug!(segments = out.len(), "computed segment statistics");
    out
}

fn single_segment(
    segment_id: SegmentId,
    samples: &[&SegmentTrafficSample],
    range: TimeRange,
    config: &RoadConfig,
) -> SegmentStatistics {
    let n = samples.len() as f64;
    let road_type = samples[0].road_type;
    let speeds: Vec<f64> = samples.iter().map(|s| s.avg_speed).collect();

    let avg_speed = speeds.iter().sum::<f64>() / n;
    let speed_variance = speeds.iter().map(|v| (v - avg_speed).powi(2)).sum::<f64>() / n;

    let (mut peak_sum, mut peak_n, mut off_sum, mut off_n) = (0.0, 0usize, 0.0, 0usize);
    for s in samples {
        let hour = hour_of_day(s.window_start + config.local_offset_secs);
        if config.peak_hours.contains(&hour) {
            peak_sum += s.flow_rate;
            peak_n += 1;
        } else {
            off_sum += s.flow_rate;
            off_n += 1;
        }
    }
    let mean = |sum: f64, k: usize| if k > 0 { sum / k as f64 } else { 0.0 };
    let peak_hour_flow = mean(peak_sum, peak_n);
    let off_peak_flow = mean(off_sum, off_n);

    let congestion_hours =
        samples.iter().filter(|s| s.congestion.is_congested()).count() as f64 * config.window_hours();

    let mut sorted = speeds.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top = (sorted.len() / 10).max(1);
    let free_flow_speed = sorted[..top].iter().sum::<f64>() / top as f64;

    let max_flow = samples.iter().map(|s| s.flow_rate).fold(0.0, f64::max);
    let capacity = config.capacity_per_lane.get(road_type) * f64::from(config.default_lanes.get(road_type));
    let capacity_utilization = if capacity > 0.0 { (max_flow / capacity).min(1.0) } else { 0.0 };

    SegmentStatistics {
        segment_id,
        road_type,
        time_range: range,
        samples: samples.len(),
        total_vehicles: samples.iter().map(|s| u64::from(s.vehicle_count)).sum(),
        avg_speed,
        speed_variance,
        peak_hour_flow,
        off_peak_flow,
        congestion_hours,
        free_flow_speed,
        capacity_utilization,
        efficiency: EfficiencyScore::compute(
            avg_speed,
            free_flow_speed,
            off_peak_flow,
            peak_hour_flow,
            congestion_hours,
        ),
    }
}

// ── Bottlenecks ───────────────────────────────────────────────────────────────

pub fn is_bottleneck(s: &SegmentStatistics, t: &BottleneckThresholds) -> bool {
    s.efficiency.overall < t.min_efficiency
        || s.capacity_utilization > t.max_utilization
        || s.congestion_hours > t.max_congestion_hours
        || s.avg_speed < t.min_avg_speed
}

/// Ids of segments meeting any bottleneck condition, in input order.
pub fn identify_bottlenecks(stats: &[SegmentStatistics], t: &BottleneckThresholds) -> Vec<SegmentId> {
    stats.iter().filter(|s| is_bottleneck(s, t)).map(|s| s.segment_id).collect()
}

// ── Speed distribution ────────────────────────────────────────────────────────

const SPEED_BANDS: [(&str, f64); 6] = [
    ("0-20", 20.0),
    ("20-40", 40.0),
    ("40-60", 60.0),
    ("60-80", 80.0),
    ("80-100", 100.0),
    ("100+", f64::INFINITY),
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedBand {
    pub range: String,
    pub vehicle_count: u64,
    pub percentage: f64,
}

/// Vehicle counts bucketed by their window's average speed.
pub fn speed_distribution(samples: &[SegmentTrafficSample]) -> Vec<SpeedBand> {
    let mut counts = [0u64; SPEED_BANDS.len()];
    for s in samples {
        let band = SPEED_BANDS
            .iter()
            .position(|&(_, upper)| s.avg_speed < upper)
            .unwrap_or(SPEED_BANDS.len() - 1);
        counts[band] += u64::from(s.vehicle_count);
    }
    let total: u64 = counts.iter().sum();
    SPEED_BANDS
        .iter()
        .zip(counts)
        .map(|(&(label, _), count)| SpeedBand {
            range: label.to_owned(),
            vehicle_count: count,
            percentage: if total > 0 { count as f64 / total as f64 * 100.0 } else { 0.0 },
        })
        .collect()
}

// ── Hourly patterns ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyPattern {
    pub hour: u8,
    pub avg_flow: f64,
    pub avg_speed: f64,
    /// Fraction of that hour's samples that are heavy or jam.
    pub congestion_index: f64,
    pub samples: usize,
}

/// Exactly 24 entries, hour 0 first.  Hours without samples are zeros.
pub fn hourly_patterns(samples: &[SegmentTrafficSample], local_offset_secs: i64) -> Vec<HourlyPattern> {
    let mut acc = [(0.0f64, 0.0f64, 0usize, 0usize); 24];
    for s in samples {
        let h = hour_of_day(s.window_start + local_offset_secs) as usize;
        acc[h].0 += s.flow_rate;
        acc[h].1 += s.avg_speed;
        acc[h].2 += usize::from(s.congestion.is_congested());
        acc[h].3 += 1;
    }
    acc.iter()
        .enumerate()
        .map(|(hour, &(flow, speed, congested, n))| {
            let div = |v: f64| if n > 0 { v / n as f64 } else { 0.0 };
            HourlyPattern {
                hour: hour as u8,
                avg_flow: div(flow),
                avg_speed: div(speed),
                congestion_index: div(congested as f64),
                samples: n,
            }
        })
        .collect()
}

// ── Network summary ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub total_segments: usize,
    pub total_vehicles: u64,
    pub network_avg_speed: f64,
    pub network_efficiency: f64,
    pub mean_capacity_utilization: f64,
    pub total_congestion_hours: f64,
    pub bottleneck_count: usize,
    pub bottleneck_percentage: f64,
    pub road_type_distribution: BTreeMap<RoadType, usize>,
    pub congestion_distribution: BTreeMap<CongestionLevel, usize>,
}

/// `None` when there are no segment statistics.
pub fn network_summary(
    stats: &[SegmentStatistics],
    samples: &[SegmentTrafficSample],
    bottlenecks: &[SegmentId],
) -> Option<NetworkSummary> {
    if stats.is_empty() {
        return None;
    }
    let n = stats.len() as f64;

    let mut road_type_distribution = BTreeMap::new();
    for s in stats {
        *road_type_distribution.entry(s.road_type).or_insert(0) += 1;
    }
    let mut congestion_distribution = BTreeMap::new();
    for s in samples {
        *congestion_distribution.entry(s.congestion).or_insert(0) += 1;
    }

    Some(NetworkSummary {
        total_segments: stats.len(),
        total_vehicles: stats.iter().map(|s| s.total_vehicles).sum(),
        network_avg_speed: stats.iter().map(|s| s.avg_speed).sum::<f64>() / n,
        network_efficiency: stats.iter().map(|s| s.efficiency.overall).sum::<f64>() / n,
        mean_capacity_utilization: stats.iter().map(|s| s.capacity_utilization).sum::<f64>() / n,
        total_congestion_hours: stats.iter().map(|s| s.congestion_hours).sum(),
        bottleneck_count: bottlenecks.len(),
        bottleneck_percentage: bottlenecks.len() as f64 / n * 100.0,
        road_type_distribution,
        congestion_distribution,
    })
}
