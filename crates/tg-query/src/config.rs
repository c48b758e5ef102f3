//! Query layer and whole-engine configuration.
//!
//! `EngineConfig` is the one document an application loads: it nests every
//! component's config so a single JSON file describes a deployment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tg_core::time::{DAY_SECS, HOUR_SECS};
use tg_od::OdConfig;
use tg_road::RoadConfig;
use tg_store::StoreConfig;

use crate::anomaly::AnomalyThresholds;
use crate::{QueryError, QueryResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Longer ranges are truncated to this span.
    pub max_span_secs: i64,
    /// Span cap for weekly passenger-flow analysis.
    pub max_weekly_span_secs: i64,
    /// Point cap above which a load is subsampled.
    pub max_points: usize,
    /// Multi-vehicle loads are sampled down to `max_points × sample_ratio`.
    pub sample_ratio: f64,
    /// Stratified sampling never keeps fewer points per vehicle than this.
    pub min_points_per_vehicle: usize,

    pub point_cache_capacity: usize,
    pub result_cache_capacity: usize,

    /// Precomputed heatmaps return at most this many cells.
    pub heatmap_top_n: usize,
    /// Track queries without a vehicle return at most this many vehicles.
    pub max_track_vehicles: usize,
    /// Hotspot clustering runs on at most this many points.
    pub cluster_point_cap: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_span_secs: 24 * HOUR_SECS,
            max_weekly_span_secs: 7 * DAY_SECS,
            max_points: 50_000,
            sample_ratio: 0.2,
            min_points_per_vehicle: 2,
            point_cache_capacity: 10,
            result_cache_capacity: 20,
            heatmap_top_n: 10_000,
            max_track_vehicles: 50,
            cluster_point_cap: 10_000,
        }
    }
}

impl QueryConfig {
    pub fn validate(&self) -> QueryResult<()> {
        let fail = |msg: &str| Err(QueryError::Config(msg.to_string()));
        if self.max_span_secs <= 0 || self.max_weekly_span_secs <= 0 {
            return fail("span caps must be positive");
        }
        if self.max_points == 0 {
            return fail("max_points must be positive");
        }
        if !(self.sample_ratio > 0.0 && self.sample_ratio <= 1.0) {
            return fail("sample_ratio must be in (0, 1]");
        }
        if self.point_cache_capacity == 0 || self.result_cache_capacity == 0 {
            return fail("cache capacities must be positive");
        }
        if self.heatmap_top_n == 0 || self.max_track_vehicles == 0 || self.cluster_point_cap == 0 {
            return fail("result caps must be positive");
        }
        Ok(())
    }

    /// Target size for stratified multi-vehicle sampling.
    pub fn multi_vehicle_target(&self) -> usize {
        ((self.max_points as f64 * self.sample_ratio) as usize).max(1)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub road: RoadConfig,
    pub od: OdConfig,
    pub query: QueryConfig,
    pub anomaly: AnomalyThresholds,
    /// Road network CSV; without one, segment analytics return empty results.
    pub road_network: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> QueryResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> QueryResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> QueryResult<()> {
        self.store.validate()?;
        self.road.validate()?;
        self.od.validate()?;
        self.anomaly.validate()?;
        self.query.validate()
    }
}
