//! `tg-query` — the online half of `taxigrid`.
//!
//! Turns `{start_time, end_time, vehicle_id?}` requests into point sets read
//! from the published store, then hands them to the road, clustering, and
//! OD crates.  [`AnalyticsEngine`] is the single entry point.
//!
//! # Request path
//!
//! ```text
//! PointQuery ──► plan_read (clip to domain, truncate span, prune by vehicle)
//!            ──► load_points (partition reads, time-merge, cancel checks)
//!            ──► sampling (uniform | stratified) ──► point cache
//!            ──► analysis ──► result cache ──► QueryResponse { success, message, data, meta }
//! ```
//!
//! # Modules
//!
//! | Module       | Contents                                               |
//! |--------------|--------------------------------------------------------|
//! | [`engine`]   | `AnalyticsEngine`, `PointQuery`, `ClusterRequest`, payloads |
//! | [`loader`]   | `ReadPlan`, `plan_read`, `load_points`, `CancelToken`  |
//! | [`sampling`] | uniform and stratified subsampling                     |
//! | [`cache`]    | `BoundedCache` (FIFO eviction), `CacheStats`           |
//! | [`heatmap`]  | `HeatmapPoint`, live and persisted heatmaps            |
//! | [`temporal`] | time-sliced heatmap frames, trends, spatial statistics |
//! | [`anomaly`]  | long-stop, speed, cluster, and detour detectors        |
//! | [`weekly`]   | weekday/weekend passenger-flow analysis                |
//! | [`tracks`]   | `VehicleTrack`, `build_tracks`                         |
//! | [`overview`] | `TrafficOverview`                                      |
//! | [`result`]   | `QueryResponse`, `QueryMeta`                           |
//! | [`config`]   | `QueryConfig`, `EngineConfig`                          |
//! | [`error`]    | `QueryError`, `QueryResult`                            |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Partition reads run on the rayon pool; enables the same flag on the store, road, and cluster crates. |

pub mod anomaly;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod heatmap;
pub mod loader;
pub mod overview;
pub mod result;
pub mod sampling;
pub mod temporal;
pub mod tracks;
pub mod weekly;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use anomaly::{
    Anomaly, AnomalyDetail, AnomalyHeatCell, AnomalyKind, AnomalyStatistics, AnomalyThresholds, Severity,
};
pub use cache::{BoundedCache, CacheStats};
pub use config::{EngineConfig, QueryConfig};
pub use engine::{
    AnalyticsEngine, AnomalyReport, AnomalyRequest, ClusterReport, ClusterRequest, LoadedPoints, OdFlows, OdPairs,
    PointQuery, SegmentReport,
};
pub use error::{QueryError, QueryResult};
pub use heatmap::HeatmapPoint;
pub use loader::{load_points, plan_read, CancelToken, ReadPlan};
pub use overview::TrafficOverview;
pub use result::{QueryMeta, QueryResponse};
pub use sampling::SamplingStrategy;
pub use temporal::{FrameParams, HeatFrame, SpatiotemporalReport, Trend};
pub use tracks::{TrackPoint, VehicleTrack};
pub use weekly::{DayPeriod, WeeklyFlowReport};
