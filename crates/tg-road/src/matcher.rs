//! Point → segment co-location join.
//!
//! Segments and points are both bucketed into one coarse grid.  A segment is
//! registered in every cell its buffered endpoint box overlaps; a point only
//! checks the segments registered in its own cell, then confirms with an
//! exact box test.  Cost is O(points × segments-per-cell) instead of
//! O(points × segments).
//!
//! A box spanning more than [`MAX_CELLS_PER_SEGMENT`] cells is not
//! registered in the grid; it is kept on a short list every point checks.
//!
//! Boxes overlap, so one point may match several segments.  Matches are
//! never deduplicated across segments.
//!
//! All of this is Euclidean on degrees; it is a bucketing step, not a
//! distance threshold.

use rustc_hash::FxHashMap;
use tracing::debug;

use tg_core::grid::validate_resolution;
use tg_core::{BoundingBox, GeoPoint, GridCell, TrajectoryPoint};

use crate::network::RoadNetwork;
use crate::RoadResult;

/// Grid cells one segment may occupy before it moves to the wide list.
pub const MAX_CELLS_PER_SEGMENT: i64 = 4_096;

pub struct SegmentMatcher {
    cell_deg: f64,
    /// Buffered box per segment, indexed like `RoadNetwork::segments()`.
    boxes: Vec<BoundingBox>,
    cells: FxHashMap<GridCell, Vec<u32>>,
    wide: Vec<u32>,
}

impl SegmentMatcher {
    pub fn new(network: &RoadNetwork, cell_deg: f64, buffer_deg: f64) -> RoadResult<Self> {
        validate_resolution(cell_deg)?;
        let boxes: Vec<BoundingBox> =
            network.segments().iter().map(|s| s.buffered_bbox(buffer_deg)).collect();

        let mut cells: FxHashMap<GridCell, Vec<u32>> = FxHashMap::default();
        let mut wide = Vec::new();
        for (i, bb) in boxes.iter().enumerate() {
            let lo = GridCell::of(bb.min_lat, bb.min_lng, cell_deg);
            let hi = GridCell::of(bb.max_lat, bb.max_lng, cell_deg);
            let span = (hi.lat_idx - lo.lat_idx + 1).saturating_mul(hi.lng_idx - lo.lng_idx + 1);
            if span > MAX_CELLS_PER_SEGMENT {
                wide.push(i as u32);
                continue;
            }
            for lat_idx in lo.lat_idx..=hi.lat_idx {
                for lng_idx in lo.lng_idx..=hi.lng_idx {
                    cells.entry(GridCell { lat_idx, lng_idx }).or_default().push(i as u32);
                }
            }
        }
        if !wide.is_empty() {
            debug!(segments = wide.len(), "segments too wide for the match grid");
        }
        Ok(Self { cell_deg, boxes, cells, wide })
    }

    /// Number of occupied grid cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Indices of every segment whose buffered box contains `p`.
    pub fn segments_for(&self, p: GeoPoint) -> impl Iterator<Item = usize> + '_ {
        let cell = GridCell::of_point(p, self.cell_deg);
        self.cells
            .get(&cell)
            .into_iter()
            .flatten()
            .chain(&self.wide)
            .map(|&i| i as usize)
            .filter(move |&i| self.boxes[i].contains(p))
    }

    /// For each segment index, the indices of `points` that fall on it.
    /// Segments with no matches are absent.
    pub fn match_points(&self, points: &[&TrajectoryPoint]) -> FxHashMap<usize, Vec<usize>> {
        let mut out: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (pi, p) in points.iter().enumerate() {
            for si in self.segments_for(p.position()) {
                out.entry(si).or_default().push(pi);
            }
        }
        out
    }
}
