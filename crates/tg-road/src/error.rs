use thiserror::Error;

use tg_core::CoreError;

#[derive(Debug, Error)]
pub enum RoadError {
    #[error("road network parse error: {0}")]
    Parse(String),

    #[error("invalid road configuration: {0}")]
    Config(String),

    #[error("duplicate segment id {0}")]
    DuplicateSegment(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type RoadResult<T> = Result<T, RoadError>;
