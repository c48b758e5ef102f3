//! Hour-partitioned Parquet point store.
//!
//! One file per hour bucket, `hour_<bucket>.parquet`, Snappy-compressed:
//!
//! | Column          | Arrow type | Meaning                        |
//! |-----------------|------------|--------------------------------|
//! | `vehicle_id`    | Utf8       | feed vehicle id                |
//! | `timestamp`     | Int64      | Unix seconds, UTC              |
//! | `lat_raw`       | Int64      | 1e-5 degree                    |
//! | `lng_raw`       | Int64      | 1e-5 degree                    |
//! | `speed_raw`     | Int64      | cm/s                           |
//! | `occupancy_raw` | Int64      | raw `TFLAG`                    |
//! | `lat`           | Float64    | degrees                        |
//! | `lng`           | Float64    | degrees                        |
//! | `speed_kmh`     | Float64    | km/h                           |
//! | `is_occupied`   | Boolean    | `TFLAG == SENTINEL`            |
//!
//! Files are written under a `.tmp` name and renamed into place once the
//! footer is flushed, so a reader either sees a complete partition or none.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int64Array, Int64Builder,
    StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use tg_core::{HourBucket, RawFix, TrajectoryPoint, VehicleId};

use crate::{StoreError, StoreResult};

const FILE_PREFIX: &str = "hour_";
const FILE_SUFFIX: &str = ".parquet";

fn partition_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("vehicle_id",    DataType::Utf8,    false),
        Field::new("timestamp",     DataType::Int64,   false),
        Field::new("lat_raw",       DataType::Int64,   false),
        Field::new("lng_raw",       DataType::Int64,   false),
        Field::new("speed_raw",     DataType::Int64,   false),
        Field::new("occupancy_raw", DataType::Int64,   false),
        Field::new("lat",           DataType::Float64, false),
        Field::new("lng",           DataType::Float64, false),
        Field::new("speed_kmh",     DataType::Float64, false),
        Field::new("is_occupied",   DataType::Boolean, false),
    ]))
}

fn snappy_props() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Directory of published hour partitions.
///
/// Reads take no locks: a partition is immutable once renamed into place.
#[derive(Clone, Debug)]
pub struct PartitionStore {
    dir: PathBuf,
}

impl PartitionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, bucket: HourBucket) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", bucket.0))
    }

    pub fn exists(&self, bucket: HourBucket) -> bool {
        self.path_for(bucket).is_file()
    }

    /// All published buckets, ascending.  A missing directory is an empty
    /// store, not an error.
    pub fn buckets(&self) -> StoreResult<Vec<HourBucket>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(bucket) = name.to_str().and_then(parse_partition_name) {
                out.push(bucket);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    // ── Write ─────────────────────────────────────────────────────────────

    /// Publish `points` as the partition for `bucket`.
    ///
    /// Callers guarantee every point belongs to `bucket`.
    pub fn write(&self, bucket: HourBucket, points: &[TrajectoryPoint]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        let final_path = self.path_for(bucket);
        let tmp_path = final_path.with_extension("parquet.tmp");

        let schema = partition_schema();
        let batch = to_batch(&schema, points)?;

        let file = File::create(&tmp_path)?;
        let mut writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(snappy_props()))?;
        writer.write(&batch)?;
        writer.close()?;

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    // ── Read ──────────────────────────────────────────────────────────────

    /// Every point in the partition, in file order.
    pub fn read(&self, bucket: HourBucket) -> StoreResult<Vec<TrajectoryPoint>> {
        self.read_where(bucket, |_| true)
    }

    /// Points of the partition that satisfy `keep`.
    pub fn read_where<F>(&self, bucket: HourBucket, mut keep: F) -> StoreResult<Vec<TrajectoryPoint>>
    where
        F: FnMut(&TrajectoryPoint) -> bool,
    {
        let file = File::open(self.path_for(bucket))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut out = Vec::new();
        for batch in reader {
            let batch = batch?;
            let vehicle_ids = column::<StringArray>(&batch, "vehicle_id")?;
            let timestamps = column::<Int64Array>(&batch, "timestamp")?;
            let lat_raw = column::<Int64Array>(&batch, "lat_raw")?;
            let lng_raw = column::<Int64Array>(&batch, "lng_raw")?;
            let speed_raw = column::<Int64Array>(&batch, "speed_raw")?;
            let occ_raw = column::<Int64Array>(&batch, "occupancy_raw")?;
            let lat = column::<Float64Array>(&batch, "lat")?;
            let lng = column::<Float64Array>(&batch, "lng")?;
            let speed = column::<Float64Array>(&batch, "speed_kmh")?;
            let occupied = column::<BooleanArray>(&batch, "is_occupied")?;

            for i in 0..batch.num_rows() {
                let point = TrajectoryPoint {
                    vehicle_id: VehicleId::from(vehicle_ids.value(i)),
                    timestamp: timestamps.value(i),
                    lat: lat.value(i),
                    lng: lng.value(i),
                    speed_kmh: speed.value(i),
                    occupied: occupied.value(i),
                    raw: RawFix {
                        lat: lat_raw.value(i),
                        lng: lng_raw.value(i),
                        speed: speed_raw.value(i),
                        occupancy: occ_raw.value(i),
                    },
                };
                if keep(&point) {
                    out.push(point);
                }
            }
        }
        Ok(out)
    }

    /// Remove every partition (and stray temp file).  Returns the number of
    /// published partitions removed.
    pub fn clear(&self) -> StoreResult<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(FILE_PREFIX) {
                continue;
            }
            if parse_partition_name(name).is_some() {
                removed += 1;
            } else if !name.ends_with(".tmp") {
                continue;
            }
            fs::remove_file(entry.path())?;
        }
        Ok(removed)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `hour_1225497600.parquet` → `HourBucket(1225497600)`.
fn parse_partition_name(name: &str) -> Option<HourBucket> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse::<i64>()
        .ok()
        .map(HourBucket)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> StoreResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| StoreError::MissingColumn(name.to_owned()))
}

fn to_batch(schema: &Arc<Schema>, points: &[TrajectoryPoint]) -> StoreResult<RecordBatch> {
    let mut vehicle_ids = StringBuilder::new();
    let mut timestamps  = Int64Builder::with_capacity(points.len());
    let mut lat_raw     = Int64Builder::with_capacity(points.len());
    let mut lng_raw     = Int64Builder::with_capacity(points.len());
    let mut speed_raw   = Int64Builder::with_capacity(points.len());
    let mut occ_raw     = Int64Builder::with_capacity(points.len());
    let mut lat         = Float64Builder::with_capacity(points.len());
    let mut lng         = Float64Builder::with_capacity(points.len());
    let mut speed       = Float64Builder::with_capacity(points.len());
    let mut occupied    = BooleanBuilder::with_capacity(points.len());

    for p in points {
        vehicle_ids.append_value(p.vehicle_id.as_str());
        timestamps.append_value(p.timestamp);
        lat_raw.append_value(p.raw.lat);
        lng_raw.append_value(p.raw.lng);
        speed_raw.append_value(p.raw.speed);
        occ_raw.append_value(p.raw.occupancy);
        lat.append_value(p.lat);
        lng.append_value(p.lng);
        speed.append_value(p.speed_kmh);
        occupied.append_value(p.occupied);
    }

    Ok(RecordBatch::try_new(
        Arc::clone(schema),
        vec![
            Arc::new(vehicle_ids.finish()),
            Arc::new(timestamps.finish()),
            Arc::new(lat_raw.finish()),
            Arc::new(lng_raw.finish()),
            Arc::new(speed_raw.finish()),
            Arc::new(occ_raw.finish()),
            Arc::new(lat.finish()),
            Arc::new(lng.finish()),
            Arc::new(speed.finish()),
            Arc::new(occupied.finish()),
        ],
    )?)
}
