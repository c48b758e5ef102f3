//! Read-side view of a published store.
//!
//! `IndexedStore` is what the query layer holds.  It loads the small indexes
//! eagerly (vehicle index, bucket list, summary) and opens partitions and
//! grid/heatmap files on demand.  Nothing here writes.

use std::collections::BTreeSet;

use tracing::debug;

use tg_core::{HourBucket, TimeRange, TrajectoryPoint};

use crate::index::{DataSummary, SpatialGridIndex, VehicleIndex};
use crate::layout::{HeatmapKind, StoreLayout};
use crate::partition::PartitionStore;
use crate::{StoreConfig, StoreResult};

pub struct IndexedStore {
    layout: StoreLayout,
    partitions: PartitionStore,
    resolutions: Vec<f64>,
    heatmap_resolution: f64,
    vehicle_index: VehicleIndex,
    buckets: BTreeSet<HourBucket>,
    summary: Option<DataSummary>,
}

impl IndexedStore {
    /// Open the store described by `config`.
    ///
    /// A store with no partitions opens fine and reports an empty domain.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let layout = StoreLayout::new(&config.root);
        let partitions = PartitionStore::new(layout.partitions_dir());
        let mut store = Self {
            layout,
            partitions,
            resolutions: config.resolutions.clone(),
            heatmap_resolution: config.heatmap_resolution,
            vehicle_index: VehicleIndex::default(),
            buckets: BTreeSet::new(),
            summary: None,
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-read the bucket list and small indexes from disk.
    pub fn reload(&mut self) -> StoreResult<()> {
        self.buckets = self.partitions.buckets()?.into_iter().collect();

        let vi_path = self.layout.vehicle_index_path();
        self.vehicle_index = if vi_path.is_file() {
            VehicleIndex::load(&vi_path)?
        } else {
            VehicleIndex::default()
        };

        let summary_path = self.layout.summary_path();
        self.summary = if summary_path.is_file() {
            Some(DataSummary::load(&summary_path)?)
        } else {
            None
        };

        debug!(
            buckets = self.buckets.len(),
            vehicles = self.vehicle_index.vehicle_count(),
            "opened store"
        );
        Ok(())
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn vehicle_index(&self) -> &VehicleIndex {
        &self.vehicle_index
    }

    pub fn summary(&self) -> Option<&DataSummary> {
        self.summary.as_ref()
    }

    pub fn buckets(&self) -> &BTreeSet<HourBucket> {
        &self.buckets
    }

    pub fn has_bucket(&self, bucket: HourBucket) -> bool {
        self.buckets.contains(&bucket)
    }

    /// Time span covered by published partitions, bucket-aligned.
    pub fn domain(&self) -> Option<TimeRange> {
        let first = self.buckets.first()?;
        let last = self.buckets.last()?;
        Some(TimeRange { start: first.start(), end: last.end() })
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    pub fn heatmap_resolution(&self) -> f64 {
        self.heatmap_resolution
    }

    // ── Partitions ────────────────────────────────────────────────────────

    pub fn read_partition(&self, bucket: HourBucket) -> StoreResult<Vec<TrajectoryPoint>> {
        self.partitions.read(bucket)
    }

    pub fn read_partition_where<F>(&self, bucket: HourBucket, keep: F) -> StoreResult<Vec<TrajectoryPoint>>
    where
        F: FnMut(&TrajectoryPoint) -> bool,
    {
        self.partitions.read_where(bucket, keep)
    }

    // ── Grids and heatmaps ────────────────────────────────────────────────

    /// The maintained resolution closest to `requested`.
    pub fn nearest_resolution(&self, requested: f64) -> Option<f64> {
        self.resolutions
            .iter()
            .copied()
            .min_by(|a, b| (a - requested).abs().total_cmp(&(b - requested).abs()))
    }

    /// Whole-domain grid at `resolution` (must be a maintained resolution).
    pub fn spatial_grid(&self, resolution: f64) -> StoreResult<SpatialGridIndex> {
        SpatialGridIndex::load(&self.layout.grid_path(resolution), resolution)
    }

    /// Precomputed heatmap for the day or hour starting at `start`, or
    /// `None` if nothing was published for it.
    pub fn heatmap(&self, kind: HeatmapKind, start: i64) -> StoreResult<Option<SpatialGridIndex>> {
        let path = self.layout.heatmap_path(kind, start);
        if !path.is_file() {
            return Ok(None);
        }
        SpatialGridIndex::load(&path, self.heatmap_resolution).map(Some)
    }
}
