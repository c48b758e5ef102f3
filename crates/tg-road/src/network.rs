//! Static road network and its CSV loader.
//!
//! # CSV format
//!
//! ```csv
//! ID,Start_X,Start_Y,END_X,END_Y,Length
//! 1,117.0012,36.6601,117.0150,36.6605,1240.5
//! ```
//!
//! `X` is longitude, `Y` latitude, `Length` metres.  Road type is derived
//! from length via [`RoadType::from_length_m`].

use std::io::Read;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::info;

use tg_core::{BoundingBox, GeoPoint, SegmentId};

use crate::segment::{LengthThresholds, RoadSegment, RoadType};
use crate::{RoadError, RoadResult};

/// Largest latitude or longitude span a loaded segment may cover.  Real
/// road segments are a few kilometres at most.
pub const MAX_SEGMENT_SPAN_DEG: f64 = 0.5;

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SegmentRecord {
    #[serde(rename = "ID")]
    id: u32,
    #[serde(rename = "Start_X")]
    start_x: f64,
    #[serde(rename = "Start_Y")]
    start_y: f64,
    #[serde(rename = "END_X")]
    end_x: f64,
    #[serde(rename = "END_Y")]
    end_y: f64,
    #[serde(rename = "Length")]
    length_m: f64,
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Immutable set of segments with id lookup.  Build with
/// [`RoadNetworkBuilder`] or load from CSV.
#[derive(Clone, Debug, Default)]
pub struct RoadNetwork {
    segments: Vec<RoadSegment>,
    by_id: FxHashMap<SegmentId, usize>,
}

impl RoadNetwork {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Option<&RoadSegment> {
        self.by_id.get(&id).map(|&i| &self.segments[i])
    }

    /// Bounding box of every endpoint.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.segments.iter().flat_map(|s| [s.start, s.end]))
    }

    /// Segment count per road type.
    pub fn type_counts(&self) -> FxHashMap<RoadType, usize> {
        let mut out = FxHashMap::default();
        for s in &self.segments {
            *out.entry(s.road_type).or_insert(0) += 1;
        }
        out
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RoadNetworkBuilder {
    segments: Vec<RoadSegment>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, segment: RoadSegment) -> &mut Self {
        self.segments.push(segment);
        self
    }

    /// Convenience: add a segment with an explicit road type, computing
    /// length by haversine.
    pub fn add(&mut self, id: u32, start: GeoPoint, end: GeoPoint, road_type: RoadType) -> &mut Self {
        self.add_segment(RoadSegment {
            id: SegmentId(id),
            start,
            end,
            length_km: start.distance_km(end),
            road_type,
        })
    }

    /// Fails on duplicate ids.
    pub fn build(self) -> RoadResult<RoadNetwork> {
        let mut by_id = FxHashMap::default();
        for (i, s) in self.segments.iter().enumerate() {
            if by_id.insert(s.id, i).is_some() {
                return Err(RoadError::DuplicateSegment(s.id.0));
            }
        }
        Ok(RoadNetwork { segments: self.segments, by_id })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

pub fn load_network_csv(path: &Path, thresholds: &LengthThresholds) -> RoadResult<RoadNetwork> {
    let file = std::fs::File::open(path)?;
    let network = load_network_reader(file, thresholds)?;
    info!(segments = network.len(), path = %path.display(), "loaded road network");
    Ok(network)
}

/// Like [`load_network_csv`] but accepts any `Read` source.
pub fn load_network_reader<R: Read>(reader: R, thresholds: &LengthThresholds) -> RoadResult<RoadNetwork> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut builder = RoadNetworkBuilder::new();

    for (line, result) in csv_reader.deserialize::<SegmentRecord>().enumerate() {
        let r = result.map_err(|e| RoadError::Parse(format!("row {}: {e}", line + 1)))?;
        if !(r.length_m.is_finite() && r.length_m >= 0.0) {
            return Err(RoadError::Parse(format!("segment {}: invalid length {}", r.id, r.length_m)));
        }
        let start = GeoPoint::new(r.start_y, r.start_x);
        let end = GeoPoint::new(r.end_y, r.end_x);
        if !start.is_valid() || !end.is_valid() {
            return Err(RoadError::Parse(format!("segment {}: coordinates off the globe", r.id)));
        }
        let span = (start.lat - end.lat).abs().max((start.lng - end.lng).abs());
        if span > MAX_SEGMENT_SPAN_DEG {
            return Err(RoadError::Parse(format!(
                "segment {}: spans {span:.3}°, limit is {MAX_SEGMENT_SPAN_DEG}°",
                r.id
            )));
        }
        builder.add_segment(RoadSegment {
            id: SegmentId(r.id),
            start,
            end,
            length_km: r.length_m / 1_000.0,
            road_type: RoadType::from_length_m(r.length_m, thresholds),
        });
    }
    builder.build()
}
