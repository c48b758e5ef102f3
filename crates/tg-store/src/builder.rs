//! Offline index builder.
//!
//! # Pipeline
//!
//! 1. **Ingest**: every source is parsed, normalized, bounds-checked, and
//!    deduplicated into per-hour buffers ([`Ingestor`]).
//! 2. **Flush**: each buffer is sorted by `(timestamp, vehicle)` and
//!    published as one partition.  In the same pass the partition is
//!    digested: vehicles seen, grid counts at every resolution, and the
//!    hour's heatmap.
//! 3. **Merge**: digests fold into the vehicle index, one spatial grid per
//!    resolution, and day heatmaps (sum of that day's hour heatmaps).
//! 4. **Summarize**: `data_summary.json` records totals and the ingest
//!    report.
//!
//! # Rebuilds
//!
//! Dedup only holds within a run, so publishing over existing partitions
//! would double-count.  [`IndexBuilder::build`] refuses with
//! [`StoreError::AlreadyPublished`]; [`IndexBuilder::rebuild`] clears first.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tracing::info;

use tg_core::{BoundingBox, DayBucket, GeoPoint, HourBucket, TimeRange, TrajectoryPoint, VehicleId};

use crate::index::{write_json, DataSummary, SpatialGridIndex, VehicleIndex, VehicleStat, VehicleStats};
use crate::ingest::{IngestOutput, IngestReport, Ingestor};
use crate::layout::{HeatmapKind, StoreLayout};
use crate::partition::PartitionStore;
use crate::{StoreConfig, StoreError, StoreResult};

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutput {
    pub partitions: Vec<HourBucket>,
    pub vehicle_index: VehicleIndex,
    pub vehicle_stats: VehicleStats,
    /// One grid per configured resolution, in configuration order.
    pub spatial_grids: Vec<SpatialGridIndex>,
    pub daily_heatmaps: usize,
    pub hourly_heatmaps: usize,
    pub report: IngestReport,
    pub summary: DataSummary,
}

/// Everything learned from one partition during flush.
struct PartitionDigest {
    bucket: HourBucket,
    vehicles: FxHashMap<VehicleId, VehicleStat>,
    grids: Vec<SpatialGridIndex>,
    heatmap: SpatialGridIndex,
    bbox: Option<BoundingBox>,
    min_ts: i64,
    max_ts: i64,
    records: u64,
}

pub struct IndexBuilder {
    config: StoreConfig,
    layout: StoreLayout,
    partitions: PartitionStore,
}

impl IndexBuilder {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let layout = StoreLayout::new(&config.root);
        let partitions = PartitionStore::new(layout.partitions_dir());
        Ok(Self { config, layout, partitions })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Ingest `sources` and publish a fresh store.
    ///
    /// Fails with [`StoreError::AlreadyPublished`] if partitions exist.
    pub fn build(&self, sources: &[PathBuf]) -> StoreResult<BuildOutput> {
        self.ensure_unpublished()?;
        let mut ingestor = Ingestor::new(self.config.bounds.clone());
        for source in sources {
            ingestor.ingest_path(source);
        }
        self.publish(ingestor.finish())
    }

    /// Publish an already-ingested batch.
    pub fn build_from(&self, ingest: IngestOutput) -> StoreResult<BuildOutput> {
        self.ensure_unpublished()?;
        self.publish(ingest)
    }

    /// Clear every published artifact, then build.
    pub fn rebuild(&self, sources: &[PathBuf]) -> StoreResult<BuildOutput> {
        self.clear()?;
        self.build(sources)
    }

    /// Remove partitions and index files.  Unrelated files are left alone.
    pub fn clear(&self) -> StoreResult<()> {
        let removed = self.partitions.clear()?;
        let mut index_files = 0usize;
        if let Ok(entries) = fs::read_dir(self.layout.index_dir()) {
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if is_index_file(name) {
                    fs::remove_file(entry.path())?;
                    index_files += 1;
                }
            }
        }
        info!(partitions = removed, index_files, root = %self.layout.root().display(), "cleared store");
        Ok(())
    }

    fn ensure_unpublished(&self) -> StoreResult<()> {
        let existing = self.partitions.buckets()?.len();
        if existing > 0 {
            return Err(StoreError::AlreadyPublished {
                partitions: existing,
                root: self.layout.root().to_path_buf(),
            });
        }
        Ok(())
    }

    // ── Publish ───────────────────────────────────────────────────────────

    fn publish(&self, ingest: IngestOutput) -> StoreResult<BuildOutput> {
        self.layout.ensure_dirs()?;
        let IngestOutput { buckets, report, files } = ingest;
        info!(
            buckets = buckets.len(),
            accepted = report.accepted,
            dropped = report.dropped(),
            files_skipped = report.files_skipped,
            "ingest complete, flushing partitions"
        );

        let mut digests = self.flush(buckets)?;
        digests.sort_unstable_by_key(|d| d.bucket);

        let hres = self.config.heatmap_resolution;
        let mut vehicle_index = VehicleIndex::default();
        let mut vehicle_stats = VehicleStats::new();
        let mut grids: Vec<SpatialGridIndex> =
            self.config.resolutions.iter().map(|&r| SpatialGridIndex::new(r)).collect();
        let mut daily: BTreeMap<DayBucket, SpatialGridIndex> = BTreeMap::new();
        let mut bbox: Option<BoundingBox> = None;
        let mut total_records = 0u64;

        for d in &digests {
            total_records += d.records;
            for (vehicle, stat) in &d.vehicles {
                vehicle_index.insert(vehicle.clone(), d.bucket);
                vehicle_stats
                    .entry(vehicle.clone())
                    .and_modify(|s| s.merge(stat))
                    .or_insert(*stat);
            }
            for (grid, partial) in grids.iter_mut().zip(&d.grids) {
                grid.merge(partial);
            }
            d.heatmap.save(&self.layout.heatmap_path(HeatmapKind::Hourly, d.bucket.start()))?;
            daily
                .entry(d.bucket.day())
                .or_insert_with(|| SpatialGridIndex::new(hres))
                .merge(&d.heatmap);
            if let Some(b) = d.bbox {
                match bbox.as_mut() {
                    Some(acc) => {
                        acc.include(GeoPoint::new(b.min_lat, b.min_lng));
                        acc.include(GeoPoint::new(b.max_lat, b.max_lng));
                    }
                    None => bbox = Some(b),
                }
            }
        }

        for (day, heatmap) in &daily {
            heatmap.save(&self.layout.heatmap_path(HeatmapKind::Daily, day.start()))?;
        }
        for grid in &grids {
            grid.save(&self.layout.grid_path(grid.resolution()))?;
        }
        vehicle_index.save(&self.layout.vehicle_index_path())?;
        write_json(&self.layout.vehicle_stats_path(), &vehicle_stats)?;

        let time_range = match (digests.first(), digests.last()) {
            (Some(first), Some(last)) => Some(TimeRange { start: first.min_ts, end: last.max_ts }),
            _ => None,
        };
        let summary = DataSummary {
            total_records,
            total_vehicles: vehicle_index.vehicle_count() as u64,
            total_hours: digests.len() as u64,
            time_range,
            coordinate_range: bbox,
            resolutions: self.config.resolutions.clone(),
            heatmap_resolution: hres,
            ingest: report.clone(),
            files,
        };
        summary.save(&self.layout.summary_path())?;

        info!(
            partitions = digests.len(),
            vehicles = summary.total_vehicles,
            records = total_records,
            grids = grids.len(),
            daily_heatmaps = daily.len(),
            "store published"
        );

        Ok(BuildOutput {
            partitions: digests.iter().map(|d| d.bucket).collect(),
            vehicle_index,
            vehicle_stats,
            spatial_grids: grids,
            daily_heatmaps: daily.len(),
            hourly_heatmaps: digests.len(),
            report,
            summary,
        })
    }

    fn flush(
        &self,
        buckets: BTreeMap<HourBucket, Vec<TrajectoryPoint>>,
    ) -> StoreResult<Vec<PartitionDigest>> {
        let work = |(bucket, mut points): (HourBucket, Vec<TrajectoryPoint>)| -> StoreResult<PartitionDigest> {
            points.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.vehicle_id.cmp(&b.vehicle_id))
            });
            self.partitions.write(bucket, &points)?;
            Ok(self.digest(bucket, &points))
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            buckets.into_par_iter().map(work).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            buckets.into_iter().map(work).collect()
        }
    }

    fn digest(&self, bucket: HourBucket, points: &[TrajectoryPoint]) -> PartitionDigest {
        let mut vehicles: FxHashMap<VehicleId, VehicleStat> = FxHashMap::default();
        let mut grids: Vec<SpatialGridIndex> =
            self.config.resolutions.iter().map(|&r| SpatialGridIndex::new(r)).collect();
        let mut heatmap = SpatialGridIndex::new(self.config.heatmap_resolution);
        let mut min_ts = i64::MAX;
        let mut max_ts = i64::MIN;

        for p in points {
            vehicles
                .entry(p.vehicle_id.clone())
                .and_modify(|s| s.observe(p.timestamp))
                .or_insert(VehicleStat { records: 1, first_seen: p.timestamp, last_seen: p.timestamp });
            for grid in &mut grids {
                grid.add(p.lat, p.lng);
            }
            heatmap.add(p.lat, p.lng);
            min_ts = min_ts.min(p.timestamp);
            max_ts = max_ts.max(p.timestamp);
        }

        PartitionDigest {
            bucket,
            vehicles,
            grids,
            heatmap,
            bbox: BoundingBox::from_points(points.iter().map(TrajectoryPoint::position)),
            min_ts,
            max_ts,
            records: points.len() as u64,
        }
    }
}

fn is_index_file(name: &str) -> bool {
    name == "vehicle_index.json"
        || name == "vehicle_stats.json"
        || name == "data_summary.json"
        || (name.starts_with("spatial_grid_") && name.ends_with(".json"))
        || (name.starts_with("heatmap_") && name.ends_with(".json"))
        || name.ends_with(".json.tmp")
}
