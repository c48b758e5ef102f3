//! `tg-cluster` — geospatial point clustering.
//!
//! Three interchangeable algorithms behind one [`Clusterer`] contract,
//! selected through the closed [`ClusterAlgorithm`] variant set:
//!
//! | Variant        | Space                    | Weights              |
//! |----------------|--------------------------|----------------------|
//! | `Dbscan`       | haversine, `eps` in km   | multiplicity         |
//! | `KMeans`       | standardized lat/lng     | sample weights       |
//! | `Hierarchical` | standardized lat/lng     | ignored              |
//!
//! # Modules
//!
//! | Module           | Contents                                         |
//! |------------------|--------------------------------------------------|
//! | [`algorithm`]    | `Clusterer`, `ClusterAlgorithm`, parameter types |
//! | [`point`]        | `WeightedPoint`, `NOISE`                         |
//! | [`metrics`]      | `QualityMetrics`, silhouette, Calinski-Harabasz  |
//! | [`analysis`]     | `cluster_data`, `analyze_clusters`, `ClusterType`|
//! | [`search`]       | `optimize_params`, `ParamGrid`                   |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                               |
//! |------------|------------------------------------------------------|
//! | `parallel` | Parameter-search trials run on the rayon pool.       |

pub mod algorithm;
pub mod analysis;
mod dbscan;
pub mod error;
mod hierarchical;
mod kmeans;
pub mod metrics;
pub mod point;
pub mod search;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use algorithm::{
    AlgorithmKind, ClusterAlgorithm, Clusterer, DbscanParams, HierarchicalParams, KMeansParams,
    Linkage, ParamOverrides,
};
pub use analysis::{analyze_clusters, cluster_data, ClusterOutcome, ClusterSummary, ClusterType};
pub use error::{ClusterError, ClusterResult};
pub use metrics::{quality_metrics, QualityMetrics};
pub use point::{WeightedPoint, NOISE};
pub use search::{optimize_params, trial_score, ParamGrid, SearchOutcome};
