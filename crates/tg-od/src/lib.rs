//! `tg-od` — origin-destination trip extraction.
//!
//! # Pipeline
//!
//! ```text
//! points ──► group by vehicle, sort by time
//!        ──► StopDetector (haversine distance + time gap)
//!        ──► segment_trips: runs between stops ──► TripFilter
//!        ──► flow_matrix / top_flows / temporal & spatial patterns
//! ```
//!
//! # Modules
//!
//! | Module       | Contents                                           |
//! |--------------|----------------------------------------------------|
//! | [`stops`]    | `Stop`, `StopDetector`                             |
//! | [`trip`]     | `Trip`, `TripFilter`, `TripExtractor`, segmentation |
//! | [`flow`]     | `FlowMatrix` over a uniform grid, `top_flows`      |
//! | [`patterns`] | temporal/spatial summaries, `od_statistics`        |
//! | [`config`]   | `OdConfig`                                         |

pub mod config;
pub mod error;
pub mod flow;
pub mod patterns;
pub mod stops;
pub mod trip;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::OdConfig;
pub use error::{OdError, OdResult};
pub use flow::{flow_matrix, top_flows, FlowEntry, FlowGrid, FlowMatrix, FlowSummary};
pub use patterns::{
    od_statistics, spatial_patterns, temporal_patterns, DescriptiveStats, OdStatistics,
    SpatialPatterns, TemporalPatterns,
};
pub use stops::{Stop, StopDetector};
pub use trip::{extract_trips, segment_trips, ExtractReport, Trip, TripEnd, TripExtractor, TripFilter};
