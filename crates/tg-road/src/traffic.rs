//! Windowed per-segment traffic aggregation.
//!
//! Points are grouped into fixed windows (`floor(ts / window) * window`),
//! matched to segments per window, and each non-empty `(segment, window)`
//! pair is reduced to one [`SegmentTrafficSample`].

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tg_core::{SegmentId, TrajectoryPoint};

use crate::congestion::{CongestionLevel, SpeedRatioClassifier};
use crate::matcher::SegmentMatcher;
use crate::network::RoadNetwork;
use crate::segment::{RoadSegment, RoadType};
use crate::{RoadConfig, RoadResult};

/// Traffic on one segment during one window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentTrafficSample {
    pub segment_id: SegmentId,
    pub road_type: RoadType,
    /// Window start, Unix seconds.
    pub window_start: i64,
    pub window_secs: i64,
    /// Distinct vehicles seen on the segment.
    pub vehicle_count: u32,
    /// Matched pings, including stationary ones.
    pub point_count: u32,
    /// Over pings with speed > 0.
    pub avg_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Vehicles per km.
    pub density: f64,
    /// Vehicles per hour.
    pub flow_rate: f64,
    pub congestion: CongestionLevel,
}

/// Reduce the pings seen on `segment` during one window.
///
/// Returns `None` when no ping has a positive speed; a window of parked
/// vehicles says nothing about flow.
pub fn aggregate(
    segment: &RoadSegment,
    window_start: i64,
    window_secs: i64,
    points: &[&TrajectoryPoint],
    classifier: &SpeedRatioClassifier,
) -> Option<SegmentTrafficSample> {
    let mut vehicles: FxHashSet<&str> = FxHashSet::default();
    let mut sum = 0.0;
    let mut moving = 0u32;
    let mut min_speed = f64::INFINITY;
    let mut max_speed = f64::NEG_INFINITY;

    for p in points {
        vehicles.insert(p.vehicle_id.as_str());
        if p.speed_kmh > 0.0 {
            sum += p.speed_kmh;
            moving += 1;
            min_speed = min_speed.min(p.speed_kmh);
            max_speed = max_speed.max(p.speed_kmh);
        }
    }
    if moving == 0 {
        return None;
    }

    let avg_speed = sum / f64::from(moving);
    let vehicle_count = vehicles.len() as u32;
    let density = if segment.length_km > 0.0 {
        f64::from(vehicle_count) / segment.length_km
    } else {
        f64::from(vehicle_count)
    };
    let flow_rate = f64::from(vehicle_count) / (window_secs as f64 / 3_600.0);

    Some(SegmentTrafficSample {
        segment_id: segment.id,
        road_type: segment.road_type,
        window_start,
        window_secs,
        vehicle_count,
        point_count: points.len() as u32,
        avg_speed,
        min_speed,
        max_speed,
        density,
        flow_rate,
        congestion: classifier.classify(segment.road_type, avg_speed),
    })
}

// ── TrafficAnalyzer ───────────────────────────────────────────────────────────

/// Matcher + classifier bound to one network.  Build once, reuse per query.
pub struct TrafficAnalyzer<'n> {
    network: &'n RoadNetwork,
    matcher: SegmentMatcher,
    classifier: SpeedRatioClassifier,
    window_secs: i64,
}

impl<'n> TrafficAnalyzer<'n> {
    pub fn new(network: &'n RoadNetwork, config: &RoadConfig) -> RoadResult<Self> {
        config.validate()?;
        Ok(Self {
            network,
            matcher: SegmentMatcher::new(network, config.match_cell_deg, config.buffer_deg)?,
            classifier: SpeedRatioClassifier::from_config(config),
            window_secs: config.window_secs,
        })
    }

    pub fn matcher(&self) -> &SegmentMatcher {
        &self.matcher
    }

    pub fn classifier(&self) -> &SpeedRatioClassifier {
        &self.classifier
    }

    /// Samples for every `(segment, window)` with moving traffic, ordered by
    /// window then segment id.
    pub fn analyze(&self, points: &[TrajectoryPoint]) -> Vec<SegmentTrafficSample> {
        let mut windows: BTreeMap<i64, Vec<&TrajectoryPoint>> = BTreeMap::new();
        for p in points {
            let start = p.timestamp.div_euclid(self.window_secs) * self.window_secs;
            windows.entry(start).or_default().push(p);
        }

        let per_window = |(start, pts): (&i64, &Vec<&TrajectoryPoint>)| self.analyze_window(*start, pts);

        #[cfg(feature = "parallel")]
        let mut samples: Vec<SegmentTrafficSample> = {
            use rayon::prelude::*;
            windows.par_iter().flat_map_iter(per_window).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let mut samples: Vec<SegmentTrafficSample> = windows.iter().flat_map(per_window).collect();

        samples.sort_by_key(|s| (s.window_start, s.segment_id));
        debug!(windows = windows.len(), samples = samples.len(), "analyzed segment traffic");
        samples
    }

    fn analyze_window(&self, start: i64, points: &[&TrajectoryPoint]) -> Vec<SegmentTrafficSample> {
        let segments = self.network.segments();
        self.matcher
            .match_points(points)
            .into_iter()
            .filter_map(|(si, idx)| {
                let matched: Vec<&TrajectoryPoint> = idx.iter().map(|&i| points[i]).collect();
                aggregate(&segments[si], start, self.window_secs, &matched, &self.classifier)
            })
            .collect()
    }
}
