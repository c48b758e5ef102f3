//! Response envelope shared by every analytical call.

use serde::{Deserialize, Serialize};

use tg_core::TimeRange;

use crate::loader::ReadPlan;
use crate::sampling::SamplingStrategy;

/// How a result was produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMeta {
    pub requested: Option<TimeRange>,
    pub effective: Option<TimeRange>,
    pub truncated: bool,
    pub out_of_domain: bool,
    pub vehicle_pruned: bool,
    pub partitions_read: usize,
    /// Points matched before sampling.
    pub raw_points: usize,
    /// Points the analysis actually ran on.
    pub points_used: usize,
    pub sampling: Option<SamplingStrategy>,
    /// Served from a result or point cache.
    pub cached: bool,
}

impl QueryMeta {
    pub fn from_plan(plan: &ReadPlan) -> Self {
        Self {
            requested: Some(plan.requested),
            effective: plan.effective,
            truncated: plan.truncated,
            out_of_domain: plan.out_of_domain,
            vehicle_pruned: plan.vehicle_pruned,
            partitions_read: plan.buckets.len(),
            ..Self::default()
        }
    }
}

/// `success` is false only when the query itself failed; empty data with
/// `success = true` is a normal outcome (e.g. out of domain).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub meta: QueryMeta,
}

impl<T> QueryResponse<T> {
    pub fn ok(data: T, meta: QueryMeta) -> Self {
        let message = if meta.out_of_domain {
            "requested range is outside the indexed domain".to_string()
        } else if meta.truncated {
            "requested range was truncated to the maximum span".to_string()
        } else {
            "ok".to_string()
        };
        Self { success: true, message, data, meta }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResponse<U> {
        QueryResponse { success: self.success, message: self.message, data: f(self.data), meta: self.meta }
    }
}

impl<T: Default> QueryResponse<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: T::default(), meta: QueryMeta::default() }
    }
}
