//! Running an algorithm and summarizing its clusters.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tg_core::GeoPoint;

use crate::algorithm::{ClusterAlgorithm, Clusterer};
use crate::error::invalid;
use crate::metrics::{quality_metrics, QualityMetrics};
use crate::point::{validate_points, WeightedPoint, NOISE};
use crate::{ClusterError, ClusterResult};

/// What the clustered points represent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    Pickup,
    Dropoff,
    #[default]
    Hotspot,
}

impl ClusterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Dropoff => "dropoff",
            Self::Hotspot => "hotspot",
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterType {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pickup" => Ok(Self::Pickup),
            "dropoff" => Ok(Self::Dropoff),
            "hotspot" => Ok(Self::Hotspot),
            other => Err(invalid("cluster_type", format!("unknown cluster type {other:?}"))),
        }
    }
}

// ── Running ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutcome {
    /// One label per input point; [`NOISE`] for unassigned.
    pub labels: Vec<i32>,
    pub metrics: QualityMetrics,
    pub algorithm: ClusterAlgorithm,
}

/// Fit `algorithm` and score the result.  Parameter and input errors are
/// returned; metric failures only leave the optional metrics empty.
pub fn cluster_data(points: &[WeightedPoint], algorithm: &ClusterAlgorithm) -> ClusterResult<ClusterOutcome> {
    algorithm.validate()?;
    validate_points(points)?;
    let labels = if points.is_empty() { Vec::new() } else { algorithm.fit(points)? };
    let metrics = quality_metrics(points, &labels);
    debug!(
        algorithm = %algorithm.kind(),
        points = points.len(),
        clusters = metrics.n_clusters,
        noise = metrics.n_noise,
        "clustered points"
    );
    Ok(ClusterOutcome { labels, metrics, algorithm: *algorithm })
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: i32,
    pub center: GeoPoint,
    pub members: Vec<WeightedPoint>,
    pub point_count: usize,
    pub total_weight: f64,
    /// `sqrt(std(lat)² + std(lng)²)` in degrees.
    pub radius_deg: f64,
    /// `total_weight / (π·radius²)`, or `total_weight` when the radius is 0.
    pub density: f64,
    pub cluster_type: ClusterType,
}

/// Summarize every non-noise cluster, densest first.
pub fn analyze_clusters(
    points: &[WeightedPoint],
    labels: &[i32],
    cluster_type: ClusterType,
) -> ClusterResult<Vec<ClusterSummary>> {
    if points.len() != labels.len() {
        return Err(ClusterError::LabelMismatch { points: points.len(), labels: labels.len() });
    }

    let mut groups: FxHashMap<i32, Vec<WeightedPoint>> = FxHashMap::default();
    for (p, &l) in points.iter().zip(labels) {
        if l != NOISE {
            groups.entry(l).or_default().push(*p);
        }
    }

    let mut out: Vec<ClusterSummary> = groups
        .into_iter()
        .map(|(cluster_id, members)| {
            let n = members.len() as f64;
            let lat = members.iter().map(|p| p.lat).sum::<f64>() / n;
            let lng = members.iter().map(|p| p.lng).sum::<f64>() / n;
            let var_lat = members.iter().map(|p| (p.lat - lat).powi(2)).sum::<f64>() / n;
            let var_lng = members.iter().map(|p| (p.lng - lng).powi(2)).sum::<f64>() / n;
            let radius_deg = (var_lat + var_lng).sqrt();
            let total_weight: f64 = members.iter().map(|p| p.weight).sum();
            let density = if radius_deg > 0.0 {
                total_weight / (std::f64::consts::PI * radius_deg * radius_deg)
            } else {
                total_weight
            };
            ClusterSummary {
                cluster_id,
                center: GeoPoint::new(lat, lng),
                point_count: members.len(),
                members,
                total_weight,
                radius_deg,
                density,
                cluster_type,
            }
        })
        .collect();

    out.sort_by(|a, b| b.density.total_cmp(&a.density).then_with(|| a.cluster_id.cmp(&b.cluster_id)));
    Ok(out)
}
