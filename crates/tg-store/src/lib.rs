//! `tg-store` — the offline half of `taxigrid`.
//!
//! Raw CSV feeds go in; an immutable, hour-partitioned point store plus its
//! indexes come out.  Query-time code only ever reads what this crate
//! publishes.
//!
//! # Modules
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`config`]    | `StoreConfig`, `PlausibilityBounds`                        |
//! | [`layout`]    | `StoreLayout`: where every published file lives            |
//! | [`ingest`]    | CSV parsing, normalization, dedup, `IngestReport`          |
//! | [`partition`] | `PartitionStore`: one Parquet file per hour bucket         |
//! | [`index`]     | `VehicleIndex`, `SpatialGridIndex`, stats, `DataSummary`   |
//! | [`builder`]   | `IndexBuilder::build` / `rebuild`                          |
//! | [`reader`]    | `IndexedStore`: read-side view for the query layer         |
//! | [`error`]     | `StoreError`, `StoreResult`                                |
//!
//! # Published layout
//!
//! ```text
//! <root>/partitions/hour_<bucket>.parquet
//! <root>/indexes/vehicle_index.json
//! <root>/indexes/vehicle_stats.json
//! <root>/indexes/spatial_grid_<resolution>.json
//! <root>/indexes/heatmap_day_<day>.json
//! <root>/indexes/heatmap_hour_<bucket>.json
//! <root>/indexes/data_summary.json
//! ```
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Partition writes and digests run on the rayon pool.     |

pub mod builder;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod layout;
pub mod partition;
pub mod reader;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use builder::{BuildOutput, IndexBuilder};
pub use config::{PlausibilityBounds, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use index::{DataSummary, SpatialGridIndex, VehicleIndex, VehicleStat, VehicleStats};
pub use ingest::{FileReport, IngestOutput, IngestReport, Ingestor};
pub use layout::{HeatmapKind, StoreLayout};
pub use partition::PartitionStore;
pub use reader::IndexedStore;
