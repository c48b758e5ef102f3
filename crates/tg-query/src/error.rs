use thiserror::Error;

use tg_cluster::ClusterError;
use tg_core::CoreError;
use tg_od::OdError;
use tg_road::RoadError;
use tg_store::StoreError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid engine configuration: {0}")]
    Config(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Road(#[from] RoadError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Od(#[from] OdError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type QueryResult<T> = Result<T, QueryError>;
