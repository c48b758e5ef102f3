//! Time-sliced heatmaps and their summary statistics.
//!
//! A range is cut into fixed frames starting at its earliest fix.  Each
//! non-empty frame gets its own grid heatmap.  With smoothing on, every
//! interior frame's cells are replaced by a 3-frame moving average over its
//! neighbours in the frame list; a cell absent from a neighbour counts as 0
//! there.  The first and last frames are left as is.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tg_core::grid::validate_resolution;
use tg_core::time::{DAY_SECS, HOUR_SECS};
use tg_core::{BoundingBox, GeoPoint, GridCell, TimeRange, TrajectoryPoint};

use crate::{QueryError, QueryResult};

/// Trend slopes within ±this per frame read as stable.
const TREND_TOLERANCE: f64 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameParams {
    pub frame_minutes: u32,
    pub resolution: f64,
    pub smoothing: bool,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self { frame_minutes: 15, resolution: 0.001, smoothing: true }
    }
}

impl FrameParams {
    pub fn validate(&self) -> QueryResult<()> {
        if self.frame_minutes == 0 {
            return Err(QueryError::Config("frame_minutes must be positive".into()));
        }
        validate_resolution(self.resolution)?;
        Ok(())
    }

    fn frame_secs(&self) -> i64 {
        i64::from(self.frame_minutes) * 60
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameCell {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatFrame {
    pub start: i64,
    /// Exclusive.
    pub end: i64,
    /// Local `HH:MM-HH:MM`.
    pub label: String,
    /// Densest first.
    pub cells: Vec<FrameCell>,
    pub total_intensity: f64,
    pub cell_count: usize,
}

fn clock(ts: i64) -> String {
    let s = ts.rem_euclid(DAY_SECS);
    format!("{:02}:{:02}", s / HOUR_SECS, s % HOUR_SECS / 60)
}

type FrameGrid = FxHashMap<GridCell, f64>;

fn smooth(grids: &[FrameGrid]) -> Vec<FrameGrid> {
    let n = grids.len();
    (0..n)
        .map(|i| {
            if i == 0 || i + 1 == n {
                return grids[i].clone();
            }
            let window = &grids[i - 1..=i + 1];
            let cells: FxHashSet<GridCell> = window.iter().flat_map(|g| g.keys().copied()).collect();
            cells
                .into_iter()
                .map(|c| {
                    let sum: f64 = window.iter().map(|g| g.get(&c).copied().unwrap_or(0.0)).sum();
                    (c, sum / window.len() as f64)
                })
                .collect()
        })
        .collect()
}

/// Heatmap frames over `points`, earliest first.  Empty frames are skipped.
pub fn dynamic_heatmap(points: &[TrajectoryPoint], params: &FrameParams, local_offset_secs: i64) -> Vec<HeatFrame> {
    let Some(origin) = points.iter().map(|p| p.timestamp).min() else {
        return Vec::new();
    };
    let frame_secs = params.frame_secs();
    let mut by_frame: BTreeMap<i64, FrameGrid> = BTreeMap::new();
    for p in points {
        let frame = (p.timestamp - origin) / frame_secs;
        *by_frame
            .entry(frame)
            .or_default()
            .entry(GridCell::of(p.lat, p.lng, params.resolution))
            .or_insert(0.0) += 1.0;
    }

    let (indices, mut grids): (Vec<i64>, Vec<FrameGrid>) = by_frame.into_iter().unzip();
    if params.smoothing && grids.len() > 2 {
        grids = smooth(&grids);
    }

    indices
        .into_iter()
        .zip(grids)
        .map(|(idx, grid)| {
            let start = origin + idx * frame_secs;
            let end = start + frame_secs;
            let mut ranked: Vec<(GridCell, f64)> = grid.into_iter().collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let cells: Vec<FrameCell> = ranked
                .into_iter()
                .map(|(cell, intensity)| {
                    let c = cell.center(params.resolution);
                    FrameCell { lat: c.lat, lng: c.lng, intensity }
                })
                .collect();
            HeatFrame {
                start,
                end,
                label: format!("{}-{}", clock(start + local_offset_secs), clock(end + local_offset_secs)),
                total_intensity: cells.iter().map(|c| c.intensity).sum(),
                cell_count: cells.len(),
                cells,
            }
        })
        .collect()
}

// ── Trend ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl Trend {
    /// `Stable` when `|slope| <= tolerance`.
    pub fn from_slope(slope: f64, tolerance: f64) -> Self {
        if slope > tolerance {
            Self::Increasing
        } else if slope < -tolerance {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }
}

/// Least-squares slope of `values` against their index; 0 for fewer than
/// two values.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    num / den
}

/// Sample variance (n − 1); 0 for fewer than two values.
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
}

// ── Spatiotemporal report ─────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesStats {
    pub total_frames: usize,
    pub time_span_hours: f64,
    pub avg_intensity: f64,
    pub max_intensity: f64,
    pub min_intensity: f64,
    pub avg_cells_per_frame: f64,
    pub trend: Trend,
    /// Start of the most intense frame; the earliest on ties.
    pub peak_time: i64,
}

impl TimeSeriesStats {
    /// `None` without frames.
    pub fn of(frames: &[HeatFrame]) -> Option<Self> {
        let first = frames.first()?;
        let last = frames.last()?;
        let intensities: Vec<f64> = frames.iter().map(|f| f.total_intensity).collect();
        let n = frames.len() as f64;
        let mut peak = first;
        for f in frames {
            if f.total_intensity > peak.total_intensity {
                peak = f;
            }
        }
        Some(Self {
            total_frames: frames.len(),
            time_span_hours: (last.start - first.start) as f64 / HOUR_SECS as f64,
            avg_intensity: intensities.iter().sum::<f64>() / n,
            max_intensity: intensities.iter().copied().fold(f64::MIN, f64::max),
            min_intensity: intensities.iter().copied().fold(f64::MAX, f64::min),
            avg_cells_per_frame: frames.iter().map(|f| f.cell_count as f64).sum::<f64>() / n,
            trend: Trend::from_slope(slope(&intensities), TREND_TOLERANCE),
            peak_time: peak.start,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialStats {
    /// Haversine length of the bounding-box diagonal, to 0.01 km.
    pub extent_km: f64,
    pub centroid: GeoPoint,
    pub lat_std: f64,
    pub lng_std: f64,
    pub total_points: usize,
    pub unique_vehicles: usize,
}

impl SpatialStats {
    pub fn of(points: &[TrajectoryPoint]) -> Option<Self> {
        let bounds = BoundingBox::from_points(points.iter().map(TrajectoryPoint::position))?;
        let lats: Vec<f64> = points.iter().map(|p| p.lat).collect();
        let lngs: Vec<f64> = points.iter().map(|p| p.lng).collect();
        let n = points.len() as f64;
        let diagonal = GeoPoint::new(bounds.min_lat, bounds.min_lng)
            .distance_km(GeoPoint::new(bounds.max_lat, bounds.max_lng));
        let vehicles: FxHashSet<_> = points.iter().map(|p| &p.vehicle_id).collect();
        Some(Self {
            extent_km: (diagonal * 100.0).round() / 100.0,
            centroid: GeoPoint::new(lats.iter().sum::<f64>() / n, lngs.iter().sum::<f64>() / n),
            lat_std: sample_variance(&lats).sqrt(),
            lng_std: sample_variance(&lngs).sqrt(),
            total_points: points.len(),
            unique_vehicles: vehicles.len(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatiotemporalReport {
    /// Earliest and latest fix.
    pub time_range: TimeRange,
    pub bounds: BoundingBox,
    pub frames: Vec<HeatFrame>,
    pub time_series: Option<TimeSeriesStats>,
    pub spatial: SpatialStats,
    pub params: FrameParams,
}

/// Frames plus time-series and spatial statistics; `None` without points.
pub fn spatiotemporal_heatmap(
    points: &[TrajectoryPoint],
    params: &FrameParams,
    local_offset_secs: i64,
) -> Option<SpatiotemporalReport> {
    let spatial = SpatialStats::of(points)?;
    let bounds = BoundingBox::from_points(points.iter().map(TrajectoryPoint::position))?;
    let start = points.iter().map(|p| p.timestamp).min()?;
    let end = points.iter().map(|p| p.timestamp).max()?;
    let frames = dynamic_heatmap(points, params, local_offset_secs);
    Some(SpatiotemporalReport {
        time_range: TimeRange { start, end },
        bounds,
        time_series: TimeSeriesStats::of(&frames),
        frames,
        spatial,
        params: params.clone(),
    })
}
