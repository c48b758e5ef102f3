//! Heatmap cells.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use tg_core::{GridCell, TrajectoryPoint};
use tg_store::SpatialGridIndex;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lng: f64,
    pub count: u64,
}

fn ranked(cells: impl Iterator<Item = (GridCell, u64)>, resolution: f64, top_n: usize) -> Vec<HeatmapPoint> {
    let mut cells: Vec<(GridCell, u64)> = cells.collect();
    cells.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    cells.truncate(top_n);
    cells
        .into_iter()
        .map(|(cell, count)| {
            let c = cell.center(resolution);
            HeatmapPoint { lat: c.lat, lng: c.lng, count }
        })
        .collect()
}

/// Live aggregation of `points` at `resolution`, densest first.
pub fn grid_heatmap(points: &[TrajectoryPoint], resolution: f64, top_n: usize) -> Vec<HeatmapPoint> {
    let mut counts: FxHashMap<GridCell, u64> = FxHashMap::default();
    for p in points {
        *counts.entry(GridCell::of(p.lat, p.lng, resolution)).or_insert(0) += 1;
    }
    ranked(counts.into_iter(), resolution, top_n)
}

/// A persisted grid as heatmap cells, densest first.
pub fn from_grid(grid: &SpatialGridIndex, top_n: usize) -> Vec<HeatmapPoint> {
    ranked(grid.iter(), grid.resolution(), top_n)
}
