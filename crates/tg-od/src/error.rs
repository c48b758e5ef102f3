use thiserror::Error;

use tg_core::CoreError;

#[derive(Debug, Error)]
pub enum OdError {
    #[error("invalid OD configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type OdResult<T> = Result<T, OdError>;
