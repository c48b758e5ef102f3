//! Congestion classification.
//!
//! Two strategies exist and neither substitutes for the other:
//!
//! | Classifier                | Input                                   | Used by                  |
//! |---------------------------|-----------------------------------------|--------------------------|
//! | [`SpeedRatioClassifier`]  | segment avg speed + road type           | segment traffic samples  |
//! | [`CompositeClassifier`]   | trip speed + spatial/temporal density   | order-derived congestion |
//!
//! Both emit the same four [`CongestionLevel`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{CompositeThresholds, RoadConfig, SpeedRatioThresholds};
use crate::segment::{RoadType, RoadTypeTable};

/// Ordered from least to most congested.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Free,
    Moderate,
    Heavy,
    Jam,
}

impl CongestionLevel {
    pub const ALL: [CongestionLevel; 4] =
        [CongestionLevel::Free, CongestionLevel::Moderate, CongestionLevel::Heavy, CongestionLevel::Jam];

    pub fn as_str(self) -> &'static str {
        match self {
            CongestionLevel::Free => "free",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Jam => "jam",
        }
    }

    /// Heavy or jam.
    #[inline]
    pub fn is_congested(self) -> bool {
        matches!(self, CongestionLevel::Heavy | CongestionLevel::Jam)
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Speed ratio ───────────────────────────────────────────────────────────────

/// `ratio = avg_speed / free_flow(road_type)`; strictly above `free` is
/// free, above `moderate` moderate, above `heavy` heavy, otherwise jam.
#[derive(Clone, Debug)]
pub struct SpeedRatioClassifier {
    free_flow_kmh: RoadTypeTable<f64>,
    thresholds: SpeedRatioThresholds,
}

impl SpeedRatioClassifier {
    pub fn new(free_flow_kmh: RoadTypeTable<f64>, thresholds: SpeedRatioThresholds) -> Self {
        Self { free_flow_kmh, thresholds }
    }

    pub fn from_config(config: &RoadConfig) -> Self {
        Self::new(config.free_flow_kmh.clone(), config.speed_ratio.clone())
    }

    pub fn free_flow(&self, road_type: RoadType) -> f64 {
        self.free_flow_kmh.get(road_type)
    }

    pub fn ratio(&self, road_type: RoadType, avg_speed_kmh: f64) -> f64 {
        avg_speed_kmh / self.free_flow(road_type)
    }

    pub fn classify(&self, road_type: RoadType, avg_speed_kmh: f64) -> CongestionLevel {
        let ratio = self.ratio(road_type, avg_speed_kmh);
        let t = &self.thresholds;
        if ratio > t.free {
            CongestionLevel::Free
        } else if ratio > t.moderate {
            CongestionLevel::Moderate
        } else if ratio > t.heavy {
            CongestionLevel::Heavy
        } else {
            CongestionLevel::Jam
        }
    }
}

// ── Composite ─────────────────────────────────────────────────────────────────

/// Order-derived observations for one area.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeInputs {
    /// Mean trip speed, km/h.
    pub avg_speed_kmh: f64,
    /// Orders per km².
    pub spatial_density: f64,
    /// Orders per hour.
    pub temporal_density: f64,
}

/// Bucketed sub-scores (1–4), their weighted sum, and the resulting label.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub speed: u8,
    pub spatial: u8,
    pub temporal: u8,
    pub composite: f64,
    pub level: CongestionLevel,
}

#[derive(Clone, Debug)]
pub struct CompositeClassifier {
    thresholds: CompositeThresholds,
}

impl CompositeClassifier {
    pub fn new(thresholds: CompositeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn from_config(config: &RoadConfig) -> Self {
        Self::new(config.composite.clone())
    }

    pub fn score(&self, inputs: &CompositeInputs) -> CompositeScore {
        let t = &self.thresholds;
        let speed = bucket_descending(inputs.avg_speed_kmh, &t.speed_kmh);
        let spatial = bucket_ascending(inputs.spatial_density, &t.spatial_density);
        let temporal = bucket_ascending(inputs.temporal_density, &t.temporal_density);
        let composite = t.speed_weight * f64::from(speed)
            + t.spatial_weight * f64::from(spatial)
            + t.temporal_weight * f64::from(temporal);

        let level = if composite < t.levels[0] {
            CongestionLevel::Free
        } else if composite < t.levels[1] {
            CongestionLevel::Moderate
        } else if composite < t.levels[2] {
            CongestionLevel::Heavy
        } else {
            CongestionLevel::Jam
        };
        CompositeScore { speed, spatial, temporal, composite, level }
    }

    pub fn classify(&self, inputs: &CompositeInputs) -> CongestionLevel {
        self.score(inputs).level
    }
}

/// Higher values are better: `> t[0]` → 1 … else 4.
fn bucket_descending(v: f64, t: &[f64; 3]) -> u8 {
    if v > t[0] {
        1
    } else if v > t[1] {
        2
    } else if v > t[2] {
        3
    } else {
        4
    }
}

/// Higher values are worse: `<= t[0]` → 1 … else 4.
fn bucket_ascending(v: f64, t: &[f64; 3]) -> u8 {
    if v <= t[0] {
        1
    } else if v <= t[1] {
        2
    } else if v <= t[2] {
        3
    } else {
        4
    }
}
