//! Transform error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    /// Neither depth nor pose is streaming; geometry has no root
    #[error("No known base_stream found for transformations.")]
    NoBaseStream,

    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl From<TransformError> for contracts::ContractError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::NoBaseStream => Self::NoBaseStream,
            TransformError::Contract(e) => e,
        }
    }
}

pub type TransformResult<T> = std::result::Result<T, TransformError>;
