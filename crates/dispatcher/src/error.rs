//! Dispatcher error types

use contracts::StreamKey;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sample of a kind the dispatcher has no path for
    #[error("unexpected sample from stream '{stream}'")]
    UnexpectedSample { stream: StreamKey },

    /// Inertial gate overflow or inertial publish failure
    #[error("imu path: {0}")]
    Sync(#[from] sync_engine::SyncError),

    #[error("calibration: {0}")]
    Calibration(#[from] calibration::CalibrationError),

    #[error("transforms: {0}")]
    Transform(#[from] transforms::TransformError),

    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn unexpected_sample(stream: StreamKey) -> Self {
        Self::UnexpectedSample { stream }
    }
}

pub type DispatcherResult<T> = std::result::Result<T, DispatcherError>;
