//! Stop detection.
//!
//! A stop is declared between consecutive fixes `i` and `i + 1` when the
//! time gap exceeds the duration threshold and the vehicle was stationary
//! at that boundary: either the gap itself spans less than the distance
//! threshold, or the vehicle had settled before it (`i - 1 → i` below the
//! threshold).  The second arm catches the common case of a taxi parking,
//! going dark, and reappearing somewhere else.
//!
//! Every distance test here is haversine.

use serde::{Deserialize, Serialize};

use tg_core::{GeoPoint, TrajectoryPoint};

use crate::OdConfig;

/// A detected stop between `points[after_index]` and `points[after_index + 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub after_index: usize,
    pub position: GeoPoint,
    pub arrived: i64,
    pub departed: i64,
}

impl Stop {
    #[inline]
    pub fn duration_secs(&self) -> i64 {
        self.departed - self.arrived
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StopDetector {
    pub distance_m: f64,
    pub duration_secs: i64,
}

impl StopDetector {
    pub fn new(distance_m: f64, duration_secs: i64) -> Self {
        Self { distance_m, duration_secs }
    }

    pub fn from_config(cfg: &OdConfig) -> Self {
        Self::new(cfg.stop_distance_m, cfg.stop_duration_secs)
    }

    /// `true` if a stop separates `points[i]` and `points[i + 1]`.
    ///
    /// Out-of-range `i` is never a stop.
    pub fn is_stop_after(&self, points: &[&TrajectoryPoint], i: usize) -> bool {
        let (Some(cur), Some(next)) = (points.get(i), points.get(i + 1)) else {
            return false;
        };
        if next.timestamp - cur.timestamp <= self.duration_secs {
            return false;
        }
        if cur.position().distance_m(next.position()) < self.distance_m {
            return true;
        }
        i > 0 && points[i - 1].position().distance_m(cur.position()) < self.distance_m
    }

    /// All stops in a time-ordered single-vehicle trajectory.
    pub fn detect(&self, points: &[&TrajectoryPoint]) -> Vec<Stop> {
        (0..points.len().saturating_sub(1))
            .filter(|&i| self.is_stop_after(points, i))
            .map(|i| Stop {
                after_index: i,
                position: points[i].position(),
                arrived: points[i].timestamp,
                departed: points[i + 1].timestamp,
            })
            .collect()
    }
}
