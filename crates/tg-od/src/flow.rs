//! Origin→destination flow aggregation.
//!
//! [`flow_matrix`] bins trip ends into a uniform grid laid over the trips'
//! bounding box and counts (origin cell, destination cell) pairs.  Bucketing
//! is Euclidean on degrees; cells are indexed `lat_idx * n_lng + lng_idx`.
//! The matrix is held sparsely since city-scale grids reach 10⁴ cells.
//!
//! [`top_flows`] groups trips by quantized endpoints (default 0.001°,
//! about 100 m) and ranks the groups by frequency.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use tg_core::grid::validate_resolution;
use tg_core::{BoundingBox, GeoPoint, GridCell};

use crate::trip::Trip;
use crate::OdResult;

// ── Grid ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowGrid {
    pub cell_deg: f64,
    pub bounds: BoundingBox,
    pub n_lat: usize,
    pub n_lng: usize,
}

impl FlowGrid {
    /// A grid of `cell_deg` cells covering `bounds`.  Always at least 1×1.
    pub fn covering(bounds: BoundingBox, cell_deg: f64) -> Self {
        let bins = |span: f64| (span / cell_deg).floor() as usize + 1;
        Self {
            cell_deg,
            bounds,
            n_lat: bins(bounds.max_lat - bounds.min_lat),
            n_lng: bins(bounds.max_lng - bounds.min_lng),
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.n_lat * self.n_lng
    }

    /// Flat cell index of `p`; points past the far edge clamp to the last cell.
    pub fn index_of(&self, p: GeoPoint) -> usize {
        let axis = |v: f64, min: f64, n: usize| {
            (((v - min) / self.cell_deg).floor().max(0.0) as usize).min(n - 1)
        };
        axis(p.lat, self.bounds.min_lat, self.n_lat) * self.n_lng
            + axis(p.lng, self.bounds.min_lng, self.n_lng)
    }

    /// Centre of cell `idx`.
    pub fn cell_center(&self, idx: usize) -> GeoPoint {
        let (lat_idx, lng_idx) = (idx / self.n_lng, idx % self.n_lng);
        GeoPoint::new(
            self.bounds.min_lat + (lat_idx as f64 + 0.5) * self.cell_deg,
            self.bounds.min_lng + (lng_idx as f64 + 0.5) * self.cell_deg,
        )
    }
}

// ── Matrix ────────────────────────────────────────────────────────────────────

/// One non-zero matrix entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    pub origin: usize,
    pub destination: usize,
    pub count: u32,
}

/// N×N origin→destination counts, `N = grid.cell_count()`.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowMatrix {
    grid: FlowGrid,
    counts: FxHashMap<(usize, usize), u32>,
    total: u64,
}

impl FlowMatrix {
    pub fn grid(&self) -> &FlowGrid {
        &self.grid
    }

    /// Side length N.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.grid.cell_count()
    }

    pub fn get(&self, origin: usize, destination: usize) -> u32 {
        self.counts.get(&(origin, destination)).copied().unwrap_or(0)
    }

    pub fn total_flows(&self) -> u64 {
        self.total
    }

    /// Non-zero entries, largest count first.
    pub fn entries(&self) -> Vec<FlowEntry> {
        let mut out: Vec<FlowEntry> = self
            .counts
            .iter()
            .map(|(&(origin, destination), &count)| FlowEntry { origin, destination, count })
            .collect();
        out.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.origin.cmp(&b.origin))
                .then_with(|| a.destination.cmp(&b.destination))
        });
        out
    }

    /// Dense row-major copy.  Only sensible for small grids.
    pub fn to_dense(&self) -> Vec<Vec<u32>> {
        let n = self.dimension();
        let mut rows = vec![vec![0; n]; n];
        for (&(o, d), &c) in &self.counts {
            rows[o][d] = c;
        }
        rows
    }
}

/// Count trips per (origin cell, destination cell).  `None` for no trips.
pub fn flow_matrix(trips: &[Trip], cell_deg: f64) -> OdResult<Option<FlowMatrix>> {
    validate_resolution(cell_deg)?;
    let ends = trips.iter().flat_map(|t| [t.origin.position(), t.destination.position()]);
    let Some(bounds) = BoundingBox::from_points(ends) else {
        return Ok(None);
    };
    let grid = FlowGrid::covering(bounds, cell_deg);

    let mut counts: FxHashMap<(usize, usize), u32> = FxHashMap::default();
    for t in trips {
        let key = (grid.index_of(t.origin.position()), grid.index_of(t.destination.position()));
        *counts.entry(key).or_insert(0) += 1;
    }
    Ok(Some(FlowMatrix { grid, counts, total: trips.len() as u64 }))
}

// ── Top flows ─────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    /// Quantized origin.
    pub origin: GeoPoint,
    /// Quantized destination.
    pub destination: GeoPoint,
    pub flow_count: u32,
    pub avg_duration_secs: f64,
    pub avg_distance_km: f64,
}

/// The `k` most frequent quantized OD pairs.  Ties break on coordinates.
pub fn top_flows(trips: &[Trip], precision_deg: f64, k: usize) -> OdResult<Vec<FlowSummary>> {
    validate_resolution(precision_deg)?;

    #[derive(Default)]
    struct Acc {
        count: u32,
        duration: f64,
        distance: f64,
    }

    let mut groups: FxHashMap<(GridCell, GridCell), Acc> = FxHashMap::default();
    for t in trips {
        let key = (
            GridCell::of_point(t.origin.position(), precision_deg),
            GridCell::of_point(t.destination.position(), precision_deg),
        );
        let acc = groups.entry(key).or_default();
        acc.count += 1;
        acc.duration += t.duration_secs as f64;
        acc.distance += t.distance_km;
    }

    let mut ranked: Vec<((GridCell, GridCell), Acc)> = groups.into_iter().collect();
    ranked.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then_with(|| ka.cmp(kb)));
    ranked.truncate(k);

    Ok(ranked
        .into_iter()
        .map(|((o, d), acc)| {
            let n = f64::from(acc.count);
            FlowSummary {
                origin: o.center(precision_deg),
                destination: d.center(precision_deg),
                flow_count: acc.count,
                avg_duration_secs: acc.duration / n,
                avg_distance_km: acc.distance / n,
            }
        })
        .collect())
}
