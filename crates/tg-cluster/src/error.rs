use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("unknown clustering algorithm {0:?} (expected dbscan, kmeans, or hierarchical)")]
    UnknownAlgorithm(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("{labels} labels for {points} points")]
    LabelMismatch { points: usize, labels: usize },
}

pub type ClusterResult<T> = Result<T, ClusterError>;

pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> ClusterError {
    ClusterError::InvalidParameter { name, reason: reason.into() }
}
