//! Simulated device error types

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Unusable simulated device setting
    #[error("invalid device setting '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl DeviceError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<DeviceError> for ContractError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::InvalidConfig { field, message } => {
                ContractError::config_validation(field, message)
            }
            DeviceError::Contract(e) => e,
        }
    }
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;
