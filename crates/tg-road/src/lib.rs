//! `tg-road` — road segment traffic engine.
//!
//! # Pipeline
//!
//! ```text
//! points ──► 15-min windows ──► SegmentMatcher (grid co-location)
//!        ──► aggregate() per (segment, window) ──► SegmentTrafficSample
//!        ──► segment_statistics / bottlenecks / distributions / summary
//!
//! trips  ──► OrderSample ──► order_congestion() (composite classifier)
//! ```
//!
//! # Modules
//!
//! | Module         | Contents                                              |
//! |----------------|-------------------------------------------------------|
//! | [`segment`]    | `RoadSegment`, `RoadType`, per-type tables            |
//! | [`network`]    | `RoadNetwork`, builder, CSV loader                    |
//! | [`matcher`]    | `SegmentMatcher`: point → segment co-location join    |
//! | [`congestion`] | `CongestionLevel`, speed-ratio and composite classifiers |
//! | [`traffic`]    | `SegmentTrafficSample`, `aggregate`, `TrafficAnalyzer`|
//! | [`stats`]      | statistics, efficiency, bottlenecks, summaries        |
//! | [`orders`]     | order-derived congestion cells                        |
//! | [`config`]     | `RoadConfig` and threshold sets                       |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Traffic windows are aggregated on the rayon pool.       |

pub mod config;
pub mod congestion;
pub mod error;
pub mod matcher;
pub mod network;
pub mod orders;
pub mod segment;
pub mod stats;
pub mod traffic;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{BottleneckThresholds, CompositeThresholds, RoadConfig, SpeedRatioThresholds};
pub use congestion::{
    CompositeClassifier, CompositeInputs, CompositeScore, CongestionLevel, SpeedRatioClassifier,
};
pub use error::{RoadError, RoadResult};
pub use matcher::{SegmentMatcher, MAX_CELLS_PER_SEGMENT};
pub use network::{load_network_csv, load_network_reader, RoadNetwork, RoadNetworkBuilder, MAX_SEGMENT_SPAN_DEG};
pub use orders::{order_congestion, OrderCongestionCell, OrderSample};
pub use segment::{LengthThresholds, RoadSegment, RoadType, RoadTypeTable};
pub use stats::{
    hourly_patterns, identify_bottlenecks, network_summary, segment_statistics, speed_distribution,
    EfficiencyScore, HourlyPattern, NetworkSummary, SegmentStatistics, SpeedBand,
};
pub use traffic::{aggregate, SegmentTrafficSample, TrafficAnalyzer};
