//! Store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use tg_core::grid::validate_resolution;
use tg_core::{BoundingBox, TimeRange, TrajectoryPoint};

use crate::{StoreError, StoreResult};

/// Grid resolutions maintained by default, in degrees.
pub const DEFAULT_RESOLUTIONS: [f64; 4] = [0.001, 0.002, 0.005, 0.01];

/// Where the store lives and what the builder maintains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the published store.
    pub root: PathBuf,

    /// Spatial grid resolutions (degrees) maintained by the builder.
    pub resolutions: Vec<f64>,

    /// Resolution of the precomputed day/hour heatmaps.
    pub heatmap_resolution: f64,

    /// Records outside these bounds are dropped at ingest.
    pub bounds: PlausibilityBounds,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/store"),
            resolutions: DEFAULT_RESOLUTIONS.to_vec(),
            heatmap_resolution: 0.002,
            bounds: PlausibilityBounds::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.resolutions.is_empty() {
            return Err(StoreError::Config("at least one grid resolution is required".into()));
        }
        for &r in &self.resolutions {
            validate_resolution(r)?;
        }
        validate_resolution(self.heatmap_resolution)?;
        self.bounds.validate()
    }
}

// ── PlausibilityBounds ────────────────────────────────────────────────────────

/// Physical-unit sanity bounds applied after normalization.
///
/// Latitude ∈ [-90, 90] and longitude ∈ [-180, 180] are always enforced; the
/// city box, speed band, and time window narrow that further.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityBounds {
    /// Service-area box.  `None` disables the city check.
    pub city: Option<BoundingBox>,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Accepted timestamp window.  `None` accepts any time.
    pub time_window: Option<TimeRange>,
}

impl Default for PlausibilityBounds {
    fn default() -> Self {
        Self {
            city: Some(BoundingBox::new(36.0, 37.0, 116.5, 117.5)),
            min_speed_kmh: 0.0,
            max_speed_kmh: 150.0,
            time_window: None,
        }
    }
}

impl PlausibilityBounds {
    /// Bounds that only reject physically impossible records.
    pub fn global() -> Self {
        Self { city: None, min_speed_kmh: 0.0, max_speed_kmh: f64::MAX, time_window: None }
    }

    pub fn accepts(&self, p: &TrajectoryPoint) -> bool {
        let pos = p.position();
        if !pos.is_valid() {
            return false;
        }
        if let Some(city) = &self.city {
            if !city.contains(pos) {
                return false;
            }
        }
        if !(self.min_speed_kmh..=self.max_speed_kmh).contains(&p.speed_kmh) {
            return false;
        }
        self.time_window.is_none_or(|w| w.contains(p.timestamp))
    }

    fn validate(&self) -> StoreResult<()> {
        if self.min_speed_kmh > self.max_speed_kmh {
            return Err(StoreError::Config(format!(
                "speed band inverted: {} > {}",
                self.min_speed_kmh, self.max_speed_kmh
            )));
        }
        if let Some(c) = &self.city {
            if c.min_lat > c.max_lat || c.min_lng > c.max_lng {
                return Err(StoreError::Config("city bounding box is inverted".into()));
            }
        }
        Ok(())
    }
}
