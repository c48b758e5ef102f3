//! Trips (OD pairs).
//!
//! A vehicle's time-ordered fixes are cut at every detected stop; each
//! maximal run between stops is a candidate trip running from its first fix
//! to its last.  With no stops the whole trajectory is one candidate.
//! Candidates are then filtered on duration and haversine distance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tg_core::{GeoPoint, TrajectoryPoint, VehicleId};

use crate::stops::StopDetector;
use crate::OdConfig;

/// One end of a trip.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripEnd {
    pub lat: f64,
    pub lng: f64,
    pub t: i64,
}

impl TripEnd {
    fn of(p: &TrajectoryPoint) -> Self {
        Self { lat: p.lat, lng: p.lng, t: p.timestamp }
    }

    #[inline]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// `"{vehicle}_{start_time}"`.
    pub trip_id: String,
    pub vehicle_id: VehicleId,
    pub origin: TripEnd,
    pub destination: TripEnd,
    pub duration_secs: i64,
    /// Haversine origin→destination distance.
    pub distance_km: f64,
}

impl Trip {
    /// Build a trip spanning a non-empty run of fixes.
    pub fn from_run(run: &[&TrajectoryPoint]) -> Option<Self> {
        let (first, last) = (run.first()?, run.last()?);
        let origin = TripEnd::of(first);
        let destination = TripEnd::of(last);
        Some(Self {
            trip_id: format!("{}_{}", first.vehicle_id, origin.t),
            vehicle_id: first.vehicle_id.clone(),
            origin,
            destination,
            duration_secs: destination.t - origin.t,
            distance_km: origin.position().distance_km(destination.position()),
        })
    }

    #[inline]
    pub fn start_time(&self) -> i64 {
        self.origin.t
    }

    #[inline]
    pub fn end_time(&self) -> i64 {
        self.destination.t
    }

    /// Mean speed in km/h, `None` for zero-duration trips.
    pub fn avg_speed_kmh(&self) -> Option<f64> {
        (self.duration_secs > 0).then(|| self.distance_km / (self.duration_secs as f64 / 3_600.0))
    }
}

// ── Filter ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TripFilter {
    pub min_secs: i64,
    pub max_secs: i64,
    pub min_km: f64,
}

impl TripFilter {
    pub fn from_config(cfg: &OdConfig) -> Self {
        Self { min_secs: cfg.min_trip_secs, max_secs: cfg.max_trip_secs, min_km: cfg.min_trip_km }
    }

    pub fn accepts(&self, trip: &Trip) -> bool {
        (self.min_secs..=self.max_secs).contains(&trip.duration_secs) && trip.distance_km >= self.min_km
    }
}

// ── Segmentation ──────────────────────────────────────────────────────────────

/// Cut one vehicle's time-ordered fixes into candidate trips.  Runs of a
/// single fix are dropped here; every other filter is left to [`TripFilter`].
pub fn segment_trips(points: &[&TrajectoryPoint], detector: &StopDetector) -> Vec<Trip> {
    let mut runs = Vec::new();
    let mut start = 0;
    for stop in detector.detect(points) {
        runs.push(&points[start..=stop.after_index]);
        start = stop.after_index + 1;
    }
    if start < points.len() {
        runs.push(&points[start..]);
    }
    runs.into_iter().filter(|run| run.len() >= 2).filter_map(Trip::from_run).collect()
}

/// Counters from one extraction pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    pub vehicles: usize,
    /// Vehicles with fewer than two fixes.
    pub vehicles_skipped: usize,
    pub candidates: usize,
    pub accepted: usize,
}

pub struct TripExtractor {
    detector: StopDetector,
    filter: TripFilter,
}

impl TripExtractor {
    pub fn new(detector: StopDetector, filter: TripFilter) -> Self {
        Self { detector, filter }
    }

    pub fn from_config(cfg: &OdConfig) -> Self {
        Self::new(StopDetector::from_config(cfg), TripFilter::from_config(cfg))
    }

    pub fn detector(&self) -> &StopDetector {
        &self.detector
    }

    pub fn filter(&self) -> &TripFilter {
        &self.filter
    }

    /// Group `points` by vehicle, order each group by time, segment, and
    /// filter.  Trips come back grouped by vehicle id, each group in time
    /// order.
    pub fn extract(&self, points: &[TrajectoryPoint]) -> (Vec<Trip>, ExtractReport) {
        let mut by_vehicle: BTreeMap<&VehicleId, Vec<&TrajectoryPoint>> = BTreeMap::new();
        for p in points {
            by_vehicle.entry(&p.vehicle_id).or_default().push(p);
        }

        let mut report = ExtractReport { vehicles: by_vehicle.len(), ..Default::default() };
        let mut trips = Vec::new();
        for (_, mut track) in by_vehicle {
            if track.len() < 2 {
                report.vehicles_skipped += 1;
                continue;
            }
            track.sort_by_key(|p| p.timestamp);
            let candidates = segment_trips(&track, &self.detector);
            report.candidates += candidates.len();
            trips.extend(candidates.into_iter().filter(|t| self.filter.accepts(t)));
        }
        report.accepted = trips.len();

        debug!(
            vehicles = report.vehicles,
            candidates = report.candidates,
            accepted = report.accepted,
            "extracted trips"
        );
        (trips, report)
    }
}

/// Extract accepted trips from a mixed-vehicle point set.
pub fn extract_trips(points: &[TrajectoryPoint], cfg: &OdConfig) -> Vec<Trip> {
    TripExtractor::from_config(cfg).extract(points).0
}
