//! Road engine configuration.
//!
//! Every empirically tuned constant lives here: the co-location grid, the
//! segment buffer, both congestion threshold sets, and the statistics knobs.

use serde::{Deserialize, Serialize};

use tg_core::grid::validate_resolution;

use crate::segment::{LengthThresholds, RoadTypeTable};
use crate::{RoadError, RoadResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Cell size (degrees) of the grid shared by points and segments.
    pub match_cell_deg: f64,
    /// Padding (degrees) around a segment's endpoint box.  0.001° ≈ 100 m.
    pub buffer_deg: f64,
    /// Aggregation window length in seconds.
    pub window_secs: i64,
    /// Offset added to UTC before taking hour-of-day (peak hours are local).
    pub local_offset_secs: i64,

    pub free_flow_kmh: RoadTypeTable<f64>,
    pub capacity_per_lane: RoadTypeTable<f64>,
    pub default_lanes: RoadTypeTable<u8>,
    pub length_thresholds: LengthThresholds,

    pub speed_ratio: SpeedRatioThresholds,
    pub composite: CompositeThresholds,

    /// Local hours counted as peak for flow statistics.
    pub peak_hours: Vec<u8>,
    /// Segments with fewer samples than this get no statistics.
    pub min_samples: usize,
    pub bottleneck: BottleneckThresholds,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            match_cell_deg: 0.001,
            buffer_deg: 0.001,
            window_secs: 900,
            local_offset_secs: 0,
            free_flow_kmh: RoadTypeTable { highway: 80.0, arterial: 50.0, urban: 40.0, local: 30.0 },
            capacity_per_lane: RoadTypeTable {
                highway: 2_000.0,
                arterial: 1_200.0,
                urban: 800.0,
                local: 600.0,
            },
            default_lanes: RoadTypeTable { highway: 3, arterial: 2, urban: 2, local: 1 },
            length_thresholds: LengthThresholds::default(),
            speed_ratio: SpeedRatioThresholds::default(),
            composite: CompositeThresholds::default(),
            peak_hours: vec![7, 8, 9, 17, 18, 19],
            min_samples: 2,
            bottleneck: BottleneckThresholds::default(),
        }
    }
}

impl RoadConfig {
    pub fn validate(&self) -> RoadResult<()> {
        validate_resolution(self.match_cell_deg)?;
        if !(self.buffer_deg.is_finite() && self.buffer_deg >= 0.0) {
            return Err(RoadError::Config(format!("buffer_deg {} must be >= 0", self.buffer_deg)));
        }
        if self.window_secs <= 0 {
            return Err(RoadError::Config("window_secs must be positive".into()));
        }
        if self.peak_hours.iter().any(|&h| h > 23) {
            return Err(RoadError::Config("peak hours must be in 0..=23".into()));
        }
        self.speed_ratio.validate()?;
        self.composite.validate()
    }

    pub fn window_hours(&self) -> f64 {
        self.window_secs as f64 / 3_600.0
    }
}

// ── Speed-ratio thresholds ────────────────────────────────────────────────────

/// Lower bounds (exclusive) on `avg_speed / free_flow` for each label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedRatioThresholds {
    pub free: f64,
    pub moderate: f64,
    pub heavy: f64,
}

impl Default for SpeedRatioThresholds {
    fn default() -> Self {
        Self { free: 0.8, moderate: 0.6, heavy: 0.3 }
    }
}

impl SpeedRatioThresholds {
    fn validate(&self) -> RoadResult<()> {
        if !(self.free > self.moderate && self.moderate > self.heavy) {
            return Err(RoadError::Config(
                "speed-ratio thresholds must satisfy free > moderate > heavy".into(),
            ));
        }
        Ok(())
    }
}

// ── Composite thresholds ──────────────────────────────────────────────────────

/// Bucketing and weighting for the order-derived composite classifier.
///
/// Each sub-score is 1 (uncongested) to 4 (jammed):
/// - speed: `> speed_kmh[0]` → 1, `> speed_kmh[1]` → 2, `> speed_kmh[2]` → 3, else 4
/// - spatial: `<= spatial_density[0]` → 1, …, else 4 (orders/km²)
/// - temporal: `<= temporal_density[0]` → 1, …, else 4 (orders/hour)
///
/// The weighted sum is labelled by `levels`: `< levels[0]` free,
/// `< levels[1]` moderate, `< levels[2]` heavy, else jam.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeThresholds {
    pub speed_kmh: [f64; 3],
    pub spatial_density: [f64; 3],
    pub temporal_density: [f64; 3],
    pub speed_weight: f64,
    pub spatial_weight: f64,
    pub temporal_weight: f64,
    pub levels: [f64; 3],
}

impl Default for CompositeThresholds {
    fn default() -> Self {
        Self {
            speed_kmh: [20.0, 10.0, 5.0],
            spatial_density: [150.0, 400.0, 800.0],
            temporal_density: [15.0, 40.0, 80.0],
            speed_weight: 0.4,
            spatial_weight: 0.3,
            temporal_weight: 0.3,
            levels: [1.75, 2.5, 3.25],
        }
    }
}

impl CompositeThresholds {
    fn validate(&self) -> RoadResult<()> {
        let descending = |a: &[f64; 3]| a[0] > a[1] && a[1] > a[2];
        let ascending = |a: &[f64; 3]| a[0] < a[1] && a[1] < a[2];
        if !descending(&self.speed_kmh) {
            return Err(RoadError::Config("composite speed thresholds must be descending".into()));
        }
        if !ascending(&self.spatial_density) || !ascending(&self.temporal_density) {
            return Err(RoadError::Config("composite density thresholds must be ascending".into()));
        }
        if !ascending(&self.levels) {
            return Err(RoadError::Config("composite level thresholds must be ascending".into()));
        }
        let w = self.speed_weight + self.spatial_weight + self.temporal_weight;
        if (w - 1.0).abs() > 1e-6 {
            return Err(RoadError::Config(format!("composite weights sum to {w}, expected 1")));
        }
        Ok(())
    }
}

// ── Bottleneck thresholds ─────────────────────────────────────────────────────

/// A segment is a bottleneck if **any** condition holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BottleneckThresholds {
    /// `efficiency_score < this`.
    pub min_efficiency: f64,
    /// `capacity_utilization > this`.
    pub max_utilization: f64,
    /// `congestion_hours > this`.
    pub max_congestion_hours: f64,
    /// `avg_speed < this` (km/h).
    pub min_avg_speed: f64,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        Self {
            min_efficiency: 50.0,
            max_utilization: 0.8,
            max_congestion_hours: 4.0,
            min_avg_speed: 20.0,
        }
    }
}
