//! `tg-core` — foundational types for the `taxigrid` trajectory-analytics
//! workspace.
//!
//! Every other `tg-*` crate depends on this one.  It has no `tg-*`
//! dependencies and keeps external ones minimal (`chrono` for calendar
//! lookups, `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module      | Contents                                                 |
//! |-------------|----------------------------------------------------------|
//! | [`ids`]     | `VehicleId`, `SegmentId`                                 |
//! | [`geo`]     | `GeoPoint`, `BoundingBox`, haversine distance            |
//! | [`time`]    | `HourBucket`, `DayBucket`, `TimeRange`, calendar helpers |
//! | [`units`]   | fixed-point ↔ physical unit conversion                   |
//! | [`point`]   | `TrajectoryPoint`, `RawFix`                              |
//! | [`grid`]    | `GridCell` deterministic spatial keys                    |
//! | [`error`]   | `CoreError`, `CoreResult`                                |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod geo;
pub mod grid;
pub mod ids;
pub mod point;
pub mod time;
pub mod units;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{BoundingBox, GeoPoint};
pub use grid::GridCell;
pub use ids::{SegmentId, VehicleId};
pub use point::{RawFix, TrajectoryPoint};
pub use time::{DayBucket, HourBucket, TimeRange};
