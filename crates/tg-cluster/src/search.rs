//! Grid search over algorithm parameters.
//!
//! Each candidate is scored by silhouette, falling back to
//! `n_clusters / (n_noise + 1)` when silhouette is unavailable and to
//! `-1` when nothing clustered.  A failing trial is logged and skipped.
//! Ties keep the earlier candidate, so results do not depend on scheduling.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::algorithm::{
    AlgorithmKind, ClusterAlgorithm, DbscanParams, HierarchicalParams, KMeansParams, Linkage,
};
use crate::analysis::cluster_data;
use crate::metrics::QualityMetrics;
use crate::point::WeightedPoint;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum ParamGrid {
    Dbscan { eps_km: Vec<f64>, min_samples: Vec<u32> },
    KMeans { k: Vec<u32> },
    Hierarchical { k: Vec<u32>, linkage: Linkage },
}

impl ParamGrid {
    pub fn default_for(kind: AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::Dbscan => Self::Dbscan {
                eps_km: vec![0.5, 1.0, 1.5, 2.0, 2.5],
                min_samples: vec![3, 5, 7, 10],
            },
            AlgorithmKind::KMeans => Self::KMeans { k: vec![3, 5, 8, 10, 12, 15] },
            AlgorithmKind::Hierarchical => {
                Self::Hierarchical { k: vec![3, 5, 8, 10, 12, 15], linkage: Linkage::Ward }
            }
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Self::Dbscan { .. } => AlgorithmKind::Dbscan,
            Self::KMeans { .. } => AlgorithmKind::KMeans,
            Self::Hierarchical { .. } => AlgorithmKind::Hierarchical,
        }
    }

    /// Cartesian product of the grid, in declaration order.
    pub fn candidates(&self) -> Vec<ClusterAlgorithm> {
        match self {
            Self::Dbscan { eps_km, min_samples } => eps_km
                .iter()
                .flat_map(|&eps_km| {
                    min_samples
                        .iter()
                        .map(move |&min_samples| ClusterAlgorithm::Dbscan(DbscanParams { eps_km, min_samples }))
                })
                .collect(),
            Self::KMeans { k } => k
                .iter()
                .map(|&k| ClusterAlgorithm::KMeans(KMeansParams { k, ..KMeansParams::default() }))
                .collect(),
            Self::Hierarchical { k, linkage } => k
                .iter()
                .map(|&k| {
                    ClusterAlgorithm::Hierarchical(HierarchicalParams {
                        k,
                        linkage: *linkage,
                        ..HierarchicalParams::default()
                    })
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub kind: AlgorithmKind,
    /// `None` when every trial failed.
    pub best: Option<ClusterAlgorithm>,
    pub best_score: f64,
    pub best_metrics: Option<QualityMetrics>,
    pub trials: usize,
    pub failed_trials: usize,
}

pub fn trial_score(m: &QualityMetrics) -> f64 {
    match m.silhouette {
        Some(s) => s,
        None if m.n_clusters > 0 => m.n_clusters as f64 / (m.n_noise + 1) as f64,
        None => -1.0,
    }
}

/// Search `grid` (or the default grid for `kind`) for the best parameters.
pub fn optimize_params(points: &[WeightedPoint], kind: AlgorithmKind, grid: Option<&ParamGrid>) -> SearchOutcome {
    let default_grid;
    let grid = match grid {
        Some(g) => g,
        None => {
            default_grid = ParamGrid::default_for(kind);
            &default_grid
        }
    };
    let candidates = grid.candidates();

    let run = |algo: &ClusterAlgorithm| match cluster_data(points, algo) {
        Ok(outcome) => Some(outcome.metrics),
        Err(e) => {
            warn!(algorithm = ?algo, error = %e, "clustering trial failed");
            None
        }
    };

    #[cfg(feature = "parallel")]
    let results: Vec<Option<QualityMetrics>> = {
        use rayon::prelude::*;
        candidates.par_iter().map(run).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Option<QualityMetrics>> = candidates.iter().map(run).collect();

    let mut out = SearchOutcome {
        kind: grid.kind(),
        best: None,
        best_score: f64::NEG_INFINITY,
        best_metrics: None,
        trials: candidates.len(),
        failed_trials: 0,
    };
    for (algo, metrics) in candidates.iter().zip(results) {
        let Some(metrics) = metrics else {
            out.failed_trials += 1;
            continue;
        };
        let score = trial_score(&metrics);
        if out.best.is_none() || score > out.best_score {
            out.best = Some(*algo);
            out.best_score = score;
            out.best_metrics = Some(metrics);
        }
    }
    debug!(
        kind = %out.kind,
        trials = out.trials,
        failed = out.failed_trials,
        best_score = out.best_score,
        "parameter search finished"
    );
    out
}
