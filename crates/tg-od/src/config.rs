//! OD extraction configuration.

use serde::{Deserialize, Serialize};

use tg_core::grid::validate_resolution;

use crate::{OdError, OdResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdConfig {
    /// Two fixes closer than this (haversine metres) count as stationary.
    pub stop_distance_m: f64,
    /// A gap longer than this between stationary fixes is a stop.
    pub stop_duration_secs: i64,

    pub min_trip_secs: i64,
    pub max_trip_secs: i64,
    /// Haversine origin→destination distance floor.
    pub min_trip_km: f64,

    /// Cell size (degrees) of the flow-matrix grid.
    pub flow_grid_deg: f64,
    /// Quantization (degrees) used to group trips in top-flow ranking.
    pub top_flow_precision_deg: f64,
    /// Number of flows reported by `od_statistics`.
    pub top_flow_count: usize,

    /// Width of the time-window histogram in minutes.
    pub time_window_minutes: u32,
    /// Offset added to UTC before taking hour-of-day and weekday.
    pub local_offset_secs: i64,
}

impl Default for OdConfig {
    fn default() -> Self {
        Self {
            stop_distance_m: 20.0,
            stop_duration_secs: 300,
            min_trip_secs: 60,
            max_trip_secs: 7_200,
            min_trip_km: 0.1,
            flow_grid_deg: 0.01,
            top_flow_precision_deg: 0.001,
            top_flow_count: 10,
            time_window_minutes: 60,
            local_offset_secs: 0,
        }
    }
}

impl OdConfig {
    pub fn validate(&self) -> OdResult<()> {
        if !(self.stop_distance_m.is_finite() && self.stop_distance_m > 0.0) {
            return Err(OdError::Config("stop_distance_m must be positive".into()));
        }
        if self.stop_duration_secs < 0 {
            return Err(OdError::Config("stop_duration_secs must be >= 0".into()));
        }
        if self.min_trip_secs < 0 || self.min_trip_secs > self.max_trip_secs {
            return Err(OdError::Config(format!(
                "trip duration bounds [{}, {}] are inverted",
                self.min_trip_secs, self.max_trip_secs
            )));
        }
        if !(self.min_trip_km.is_finite() && self.min_trip_km >= 0.0) {
            return Err(OdError::Config("min_trip_km must be >= 0".into()));
        }
        validate_resolution(self.flow_grid_deg)?;
        validate_resolution(self.top_flow_precision_deg)?;
        if self.time_window_minutes == 0 || self.time_window_minutes > 1_440 {
            return Err(OdError::Config("time_window_minutes must be in 1..=1440".into()));
        }
        Ok(())
    }
}
