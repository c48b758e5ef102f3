//! Read planning and partition loading.
//!
//! A load resolves `(range, vehicle?)` into the smallest set of hour
//! partitions that can hold matching points:
//!
//! 1. Clip the range to the published domain.  Nothing left means
//!    out-of-domain: an empty, flagged result, never an error.
//! 2. Truncate what remains to the configured maximum span.
//! 3. If the vehicle is in the vehicle index, open only its buckets;
//!    otherwise open every published bucket in range.
//!
//! Partitions are write-once, so reads need no locking.  The cancel token is
//! checked before each partition read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tg_core::{HourBucket, TimeRange, TrajectoryPoint};
use tg_store::IndexedStore;

use crate::{QueryError, QueryResult};

/// Cooperative cancellation flag shared between a caller and a running query.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> QueryResult<()> {
        if self.is_cancelled() { Err(QueryError::Cancelled) } else { Ok(()) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadPlan {
    pub requested: TimeRange,
    /// The range actually scanned; `None` when out of domain.
    pub effective: Option<TimeRange>,
    pub truncated: bool,
    pub out_of_domain: bool,
    /// Buckets came from the vehicle index rather than a range scan.
    pub vehicle_pruned: bool,
    pub buckets: Vec<HourBucket>,
}

pub fn plan_read(
    store: &IndexedStore,
    requested: TimeRange,
    vehicle: Option<&str>,
    max_span_secs: i64,
) -> ReadPlan {
    let mut plan = ReadPlan {
        requested,
        effective: None,
        truncated: false,
        out_of_domain: true,
        vehicle_pruned: false,
        buckets: Vec::new(),
    };
    let Some(clipped) = store.domain().and_then(|d| d.intersect(&requested)) else {
        debug!(range = %requested, "query range outside indexed domain");
        return plan;
    };
    let (effective, truncated) = clipped.truncated(max_span_secs);
    if truncated {
        debug!(requested = %requested, effective = %effective, "query range truncated");
    }
    plan.effective = Some(effective);
    plan.truncated = truncated;
    plan.out_of_domain = false;

    let indexed = vehicle.and_then(|v| store.vehicle_index().buckets_for(v));
    plan.buckets = match indexed {
        Some(list) => {
            plan.vehicle_pruned = true;
            list.iter()
                .map(|&b| HourBucket(b))
                .filter(|b| b.range().intersect(&effective).is_some() && store.has_bucket(*b))
                .collect()
        }
        None => effective.hour_buckets().filter(|b| store.has_bucket(*b)).collect(),
    };
    plan
}

/// Read every planned partition, keep points inside the effective range
/// (and matching `vehicle`), and merge them in time order.
pub fn load_points(
    store: &IndexedStore,
    plan: &ReadPlan,
    vehicle: Option<&str>,
    cancel: &CancelToken,
) -> QueryResult<Vec<TrajectoryPoint>> {
    let Some(range) = plan.effective else {
        return Ok(Vec::new());
    };

    let read = |bucket: &HourBucket| -> QueryResult<Vec<TrajectoryPoint>> {
        cancel.check()?;
        let keep = |p: &TrajectoryPoint| {
            range.contains(p.timestamp) && vehicle.is_none_or(|v| p.vehicle_id.as_str() == v)
        };
        Ok(store.read_partition_where(*bucket, keep)?)
    };

    #[cfg(feature = "parallel")]
    let parts: Vec<Vec<TrajectoryPoint>> = {
        use rayon::prelude::*;
        plan.buckets.par_iter().map(read).collect::<QueryResult<_>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let parts: Vec<Vec<TrajectoryPoint>> = plan.buckets.iter().map(read).collect::<QueryResult<_>>()?;

    let mut points: Vec<TrajectoryPoint> = parts.into_iter().flatten().collect();
    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.vehicle_id.cmp(&b.vehicle_id)));
    debug!(partitions = plan.buckets.len(), points = points.len(), "loaded partitions");
    Ok(points)
}
