//! Raw feed ingestion.
//!
//! # CSV format
//!
//! ```csv
//! COMMADDR,UTC,LAT,LON,HEAD,SPEED,TFLAG
//! 13305300001,1225497650,3665000,11712000,90,1000,268435456
//! ```
//!
//! `HEAD` is optional and ignored.  Coordinates are 1e-5 degree fixed point,
//! speed is cm/s, and `TFLAG` marks occupancy (see [`tg_core::units`]).
//!
//! # Failure semantics
//!
//! Nothing here aborts a run.  An unreadable file or one missing required
//! columns is counted in `files_skipped`; an unparseable row in
//! `parse_errors`; a row failing [`PlausibilityBounds`] in `out_of_bounds`;
//! a repeat of `(vehicle, ts, lat, lng)` in `duplicates`.
//!
//! Accepted points are held per hour bucket until the builder flushes them.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tg_core::point::DedupKey;
use tg_core::{HourBucket, RawFix, TrajectoryPoint, VehicleId};

use crate::{PlausibilityBounds, StoreResult};

const REQUIRED_COLUMNS: [&str; 6] = ["COMMADDR", "UTC", "LAT", "LON", "SPEED", "TFLAG"];

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawRecord {
    #[serde(rename = "COMMADDR")]
    vehicle: String,
    #[serde(rename = "UTC")]
    utc: i64,
    #[serde(rename = "LAT")]
    lat: i64,
    #[serde(rename = "LON")]
    lon: i64,
    #[serde(rename = "SPEED")]
    speed: i64,
    #[serde(rename = "TFLAG")]
    tflag: i64,
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// Drop and accept counters.  Merged across files into an end-of-run report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files_read: u64,
    pub files_skipped: u64,
    pub rows_read: u64,
    pub parse_errors: u64,
    pub out_of_bounds: u64,
    pub duplicates: u64,
    pub accepted: u64,
}

impl IngestReport {
    pub fn merge(&mut self, other: &IngestReport) {
        self.files_read += other.files_read;
        self.files_skipped += other.files_skipped;
        self.rows_read += other.rows_read;
        self.parse_errors += other.parse_errors;
        self.out_of_bounds += other.out_of_bounds;
        self.duplicates += other.duplicates;
        self.accepted += other.accepted;
    }

    /// Rows that did not make it into a partition.
    pub fn dropped(&self) -> u64 {
        self.parse_errors + self.out_of_bounds + self.duplicates
    }
}

/// Per-source counters, kept for the data summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub source: String,
    pub report: IngestReport,
    /// Why the whole file was skipped, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

/// Everything an ingest run produced, ready for the builder.
#[derive(Debug, Default)]
pub struct IngestOutput {
    pub buckets: BTreeMap<HourBucket, Vec<TrajectoryPoint>>,
    pub report: IngestReport,
    pub files: Vec<FileReport>,
}

// ── Ingestor ──────────────────────────────────────────────────────────────────

/// Accumulates normalized, deduplicated points across any number of sources.
pub struct Ingestor {
    bounds: PlausibilityBounds,
    buckets: BTreeMap<HourBucket, Vec<TrajectoryPoint>>,
    seen: FxHashSet<DedupKey>,
    report: IngestReport,
    files: Vec<FileReport>,
}

impl Ingestor {
    pub fn new(bounds: PlausibilityBounds) -> Self {
        Self {
            bounds,
            buckets: BTreeMap::new(),
            seen: FxHashSet::default(),
            report: IngestReport::default(),
            files: Vec::new(),
        }
    }

    /// Ingest one CSV file.  Open failures are counted, not returned.
    pub fn ingest_path(&mut self, path: &Path) -> &FileReport {
        let source = path.display().to_string();
        match File::open(path) {
            Ok(file) => self.ingest_reader(&source, file),
            Err(e) => {
                warn!(%source, error = %e, "skipping unreadable source");
                self.skip(source, e.to_string())
            }
        }
    }

    /// Ingest any CSV `Read` source.  `source` labels it in the report.
    pub fn ingest_reader<R: Read>(&mut self, source: &str, reader: R) -> &FileReport {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = match csv_reader.headers() {
            Ok(h) => h.clone(),
            Err(e) => {
                warn!(%source, error = %e, "skipping source with unreadable header");
                return self.skip(source.to_owned(), e.to_string());
            }
        };
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .collect();
        if !missing.is_empty() {
            let reason = format!("missing columns {missing:?}");
            warn!(%source, %reason, "skipping source");
            return self.skip(source.to_owned(), reason);
        }

        let mut report = IngestReport { files_read: 1, ..IngestReport::default() };
        for result in csv_reader.deserialize::<RawRecord>() {
            report.rows_read += 1;
            let Ok(rec) = result else {
                report.parse_errors += 1;
                continue;
            };
            let raw = RawFix { lat: rec.lat, lng: rec.lon, speed: rec.speed, occupancy: rec.tflag };
            let point = TrajectoryPoint::from_raw(VehicleId(rec.vehicle), rec.utc, raw);

            if !self.bounds.accepts(&point) {
                report.out_of_bounds += 1;
                continue;
            }
            if !self.seen.insert(point.dedup_key()) {
                report.duplicates += 1;
                continue;
            }
            report.accepted += 1;
            self.buckets.entry(point.bucket()).or_default().push(point);
        }

        if report.dropped() > 0 {
            warn!(
                %source,
                parse_errors = report.parse_errors,
                out_of_bounds = report.out_of_bounds,
                duplicates = report.duplicates,
                "dropped records"
            );
        } else {
            debug!(%source, accepted = report.accepted, "ingested source");
        }
        self.push(FileReport { source: source.to_owned(), report, skipped_reason: None })
    }

    /// Points accepted so far.
    pub fn accepted(&self) -> u64 {
        self.report.accepted
    }

    pub fn finish(self) -> IngestOutput {
        IngestOutput { buckets: self.buckets, report: self.report, files: self.files }
    }

    fn skip(&mut self, source: String, reason: String) -> &FileReport {
        let report = IngestReport { files_skipped: 1, ..IngestReport::default() };
        self.push(FileReport { source, report, skipped_reason: Some(reason) })
    }

    fn push(&mut self, file: FileReport) -> &FileReport {
        self.report.merge(&file.report);
        self.files.push(file);
        &self.files[self.files.len() - 1]
    }
}

/// Every `*.csv` file directly under `dir`, sorted by name.
pub fn csv_sources_in(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
