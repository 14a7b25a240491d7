//! Calibration error types

use contracts::StreamKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Profile carries no optical intrinsics
    #[error("stream '{stream}' has no intrinsics")]
    MissingIntrinsics { stream: StreamKey },

    /// `update` was never called for the stream
    #[error("stream '{stream}' is not calibrated yet")]
    NotCalibrated { stream: StreamKey },

    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl CalibrationError {
    pub fn missing_intrinsics(stream: StreamKey) -> Self {
        Self::MissingIntrinsics { stream }
    }
}

pub type CalibrationResult<T> = std::result::Result<T, CalibrationError>;
