//! The closed set of clustering algorithms.
//!
//! Each variant carries its own parameter struct and implements
//! [`Clusterer`]; [`ClusterAlgorithm`] dispatches to the variant.  Adding an
//! algorithm means adding a variant here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::invalid;
use crate::point::WeightedPoint;
use crate::{dbscan, hierarchical, kmeans, ClusterError, ClusterResult};

/// One clustering strategy: points in, one label per point out.
///
/// Labels are `0..n_clusters`, with [`NOISE`](crate::NOISE) for unassigned
/// points.  Implementations validate their own parameters.
pub trait Clusterer: Send + Sync {
    fn fit(&self, points: &[WeightedPoint]) -> ClusterResult<Vec<i32>>;
}

// ── Kinds ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    Dbscan,
    KMeans,
    Hierarchical,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 3] = [Self::Dbscan, Self::KMeans, Self::Hierarchical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dbscan => "dbscan",
            Self::KMeans => "kmeans",
            Self::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmKind {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dbscan" => Ok(Self::Dbscan),
            "kmeans" | "k-means" => Ok(Self::KMeans),
            "hierarchical" | "agglomerative" => Ok(Self::Hierarchical),
            _ => Err(ClusterError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    #[default]
    Ward,
    Complete,
    Average,
    Single,
}

impl FromStr for Linkage {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ward" => Ok(Self::Ward),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            "single" => Ok(Self::Single),
            other => Err(invalid("linkage", format!("unknown linkage {other:?}"))),
        }
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighbourhood radius in kilometres (haversine).
    pub eps_km: f64,
    /// Minimum weighted neighbourhood size, the point itself included.
    pub min_samples: u32,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self { eps_km: 1.0, min_samples: 5 }
    }
}

impl DbscanParams {
    pub fn validate(&self) -> ClusterResult<()> {
        if !(self.eps_km.is_finite() && self.eps_km > 0.0) {
            return Err(invalid("eps_km", format!("{} must be positive", self.eps_km)));
        }
        if self.min_samples == 0 {
            return Err(invalid("min_samples", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansParams {
    /// Requested cluster count; clamped to the number of points.
    pub k: u32,
    pub seed: u64,
    /// Independent seeded restarts; the lowest-inertia run wins.
    pub n_init: u32,
    pub max_iter: u32,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { k: 8, seed: 42, n_init: 10, max_iter: 300 }
    }
}

impl KMeansParams {
    pub fn validate(&self) -> ClusterResult<()> {
        if self.k == 0 {
            return Err(invalid("k", "must be at least 1"));
        }
        if self.n_init == 0 {
            return Err(invalid("n_init", "must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(invalid("max_iter", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalParams {
    /// Requested cluster count; clamped to the number of points.
    pub k: u32,
    pub linkage: Linkage,
    /// The distance matrix is O(n²); larger inputs are clustered on a
    /// strided sample of this size and the rest assigned to the nearest
    /// centroid.
    pub max_points: usize,
}

impl Default for HierarchicalParams {
    fn default() -> Self {
        Self { k: 8, linkage: Linkage::Ward, max_points: 3_000 }
    }
}

impl HierarchicalParams {
    pub fn validate(&self) -> ClusterResult<()> {
        if self.k == 0 {
            return Err(invalid("k", "must be at least 1"));
        }
        if self.max_points == 0 {
            return Err(invalid("max_points", "must be at least 1"));
        }
        Ok(())
    }
}

impl Clusterer for DbscanParams {
    fn fit(&self, points: &[WeightedPoint]) -> ClusterResult<Vec<i32>> {
        self.validate()?;
        Ok(dbscan::dbscan(points, self))
    }
}

impl Clusterer for KMeansParams {
    fn fit(&self, points: &[WeightedPoint]) -> ClusterResult<Vec<i32>> {
        self.validate()?;
        Ok(kmeans::kmeans(points, self).labels)
    }
}

impl Clusterer for HierarchicalParams {
    fn fit(&self, points: &[WeightedPoint]) -> ClusterResult<Vec<i32>> {
        self.validate()?;
        Ok(hierarchical::agglomerative(points, self))
    }
}

// ── Tagged variant ────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "params", rename_all = "lowercase")]
pub enum ClusterAlgorithm {
    Dbscan(DbscanParams),
    KMeans(KMeansParams),
    Hierarchical(HierarchicalParams),
}

impl Default for ClusterAlgorithm {
    fn default() -> Self {
        Self::Dbscan(DbscanParams::default())
    }
}

impl ClusterAlgorithm {
    pub fn with_defaults(kind: AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::Dbscan => Self::Dbscan(DbscanParams::default()),
            AlgorithmKind::KMeans => Self::KMeans(KMeansParams::default()),
            AlgorithmKind::Hierarchical => Self::Hierarchical(HierarchicalParams::default()),
        }
    }

    /// Resolve a request-style `(name, overrides)` pair.  Overrides that do
    /// not apply to the named algorithm are ignored.
    pub fn resolve(name: &str, overrides: &ParamOverrides) -> ClusterResult<Self> {
        let algo = Self::with_defaults(name.parse()?).apply(overrides)?;
        algo.validate()?;
        Ok(algo)
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Self::Dbscan(_) => AlgorithmKind::Dbscan,
            Self::KMeans(_) => AlgorithmKind::KMeans,
            Self::Hierarchical(_) => AlgorithmKind::Hierarchical,
        }
    }

    pub fn validate(&self) -> ClusterResult<()> {
        match self {
            Self::Dbscan(p) => p.validate(),
            Self::KMeans(p) => p.validate(),
            Self::Hierarchical(p) => p.validate(),
        }
    }

    fn apply(mut self, o: &ParamOverrides) -> ClusterResult<Self> {
        match &mut self {
            Self::Dbscan(p) => {
                p.eps_km = o.eps_km.unwrap_or(p.eps_km);
                p.min_samples = o.min_samples.unwrap_or(p.min_samples);
            }
            Self::KMeans(p) => {
                p.k = o.k.unwrap_or(p.k);
                p.seed = o.seed.unwrap_or(p.seed);
                p.n_init = o.n_init.unwrap_or(p.n_init);
                p.max_iter = o.max_iter.unwrap_or(p.max_iter);
            }
            Self::Hierarchical(p) => {
                p.k = o.k.unwrap_or(p.k);
                if let Some(l) = &o.linkage {
                    p.linkage = l.parse()?;
                }
            }
        }
        Ok(self)
    }
}

impl Clusterer for ClusterAlgorithm {
    fn fit(&self, points: &[WeightedPoint]) -> ClusterResult<Vec<i32>> {
        match self {
            Self::Dbscan(p) => p.fit(points),
            Self::KMeans(p) => p.fit(points),
            Self::Hierarchical(p) => p.fit(points),
        }
    }
}

/// Optional per-request parameter overrides, as they arrive from callers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamOverrides {
    pub eps_km: Option<f64>,
    pub min_samples: Option<u32>,
    pub k: Option<u32>,
    pub seed: Option<u64>,
    pub n_init: Option<u32>,
    pub max_iter: Option<u32>,
    pub linkage: Option<String>,
}
