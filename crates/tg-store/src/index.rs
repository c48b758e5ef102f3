//! Persisted indexes.
//!
//! All index files are JSON.  The spatial grid serializes as a flat map of
//! `"{lat:.6},{lng:.6}"` → count; in memory it is keyed by integer
//! [`GridCell`]s so aggregation never depends on float formatting.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tg_core::{BoundingBox, GridCell, HourBucket, TimeRange, VehicleId};

use crate::ingest::{FileReport, IngestReport};
use crate::StoreResult;

// ── JSON helpers ──────────────────────────────────────────────────────────────

/// Write `value` to `path` via a temp file and rename.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut w, value)?;
        std::io::Write::flush(&mut w)?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let r = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(r)?)
}

// ── VehicleIndex ──────────────────────────────────────────────────────────────

/// vehicle → ascending list of hour buckets that contain it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleIndex {
    buckets: BTreeMap<VehicleId, Vec<i64>>,
}

impl VehicleIndex {
    /// Record that `vehicle` appears in `bucket`.  Keeps lists sorted and
    /// unique.
    pub fn insert(&mut self, vehicle: VehicleId, bucket: HourBucket) {
        let list = self.buckets.entry(vehicle).or_default();
        if let Err(pos) = list.binary_search(&bucket.0) {
            list.insert(pos, bucket.0);
        }
    }

    pub fn buckets_for(&self, vehicle: &str) -> Option<&[i64]> {
        self.buckets.get(vehicle).map(Vec::as_slice)
    }

    pub fn contains(&self, vehicle: &str) -> bool {
        self.buckets.contains_key(vehicle)
    }

    pub fn vehicle_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleId> {
        self.buckets.keys()
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        read_json(path)
    }
}

// ── SpatialGridIndex ──────────────────────────────────────────────────────────

/// Point counts per grid cell at one resolution.
///
/// Also the in-memory form of a precomputed heatmap file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpatialGridIndex {
    resolution: f64,
    counts: FxHashMap<GridCell, u64>,
}

impl SpatialGridIndex {
    pub fn new(resolution: f64) -> Self {
        Self { resolution, counts: FxHashMap::default() }
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    #[inline]
    pub fn add(&mut self, lat: f64, lng: f64) {
        *self.counts.entry(GridCell::of(lat, lng, self.resolution)).or_insert(0) += 1;
    }

    pub fn add_cell(&mut self, cell: GridCell, count: u64) {
        *self.counts.entry(cell).or_insert(0) += count;
    }

    /// Fold `other` (same resolution) into `self`.
    pub fn merge(&mut self, other: &SpatialGridIndex) {
        for (&cell, &n) in &other.counts {
            self.add_cell(cell, n);
        }
    }

    /// Count for the cell containing `(lat, lng)`; 0 for unseen cells.
    pub fn count_at(&self, lat: f64, lng: f64) -> u64 {
        self.count_cell(GridCell::of(lat, lng, self.resolution))
    }

    pub fn count_cell(&self, cell: GridCell) -> u64 {
        self.counts.get(&cell).copied().unwrap_or(0)
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridCell, u64)> + '_ {
        self.counts.iter().map(|(&c, &n)| (c, n))
    }

    /// Serialized form: `"{lat:.6},{lng:.6}"` → count, sorted by key.
    pub fn to_key_map(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(c, &n)| (c.key(self.resolution), n))
            .collect()
    }

    pub fn from_key_map(resolution: f64, map: &BTreeMap<String, u64>) -> StoreResult<Self> {
        let mut out = Self::new(resolution);
        for (key, &n) in map {
            out.add_cell(GridCell::parse_key(key, resolution)?, n);
        }
        Ok(out)
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_json(path, &self.to_key_map())
    }

    pub fn load(path: &Path, resolution: f64) -> StoreResult<Self> {
        let map: BTreeMap<String, u64> = read_json(path)?;
        Self::from_key_map(resolution, &map)
    }
}

// ── Vehicle statistics ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleStat {
    pub records: u64,
    pub first_seen: i64,
    pub last_seen: i64,
}

impl VehicleStat {
    pub fn observe(&mut self, ts: i64) {
        self.records += 1;
        self.first_seen = self.first_seen.min(ts);
        self.last_seen = self.last_seen.max(ts);
    }

    pub fn merge(&mut self, other: &VehicleStat) {
        self.records += other.records;
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
    }

    pub fn time_span_secs(&self) -> i64 {
        self.last_seen - self.first_seen
    }
}

/// Per-vehicle record counts and observed time span.
pub type VehicleStats = BTreeMap<VehicleId, VehicleStat>;

// ── DataSummary ───────────────────────────────────────────────────────────────

/// Whole-store description written at the end of a build.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub total_records: u64,
    pub total_vehicles: u64,
    pub total_hours: u64,
    pub time_range: Option<TimeRange>,
    pub coordinate_range: Option<BoundingBox>,
    pub resolutions: Vec<f64>,
    pub heatmap_resolution: f64,
    pub ingest: IngestReport,
    pub files: Vec<FileReport>,
}

impl DataSummary {
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        read_json(path)
    }
}
