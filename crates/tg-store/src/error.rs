use std::path::PathBuf;

use thiserror::Error;

use tg_core::CoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "{partitions} partition(s) already published under {root:?}; \
         call rebuild() to clear and rebuild"
    )]
    AlreadyPublished { partitions: usize, root: PathBuf },

    #[error("partition file is missing column {0:?}")]
    MissingColumn(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
