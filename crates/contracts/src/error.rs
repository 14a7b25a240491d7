//! Layered error definitions
//!
//! Categorized by source: config / device / payload / sync / transform / bus

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Generic device failure
    #[error("device error: {message}")]
    Device { message: String },

    /// The device knows no relation between two profiles
    #[error("extrinsics not available from '{from}' to '{to}'")]
    ExtrinsicsUnavailable { from: String, to: String },

    /// Motion intrinsics missing for a stream
    #[error("motion intrinsics not available for '{stream}'")]
    MotionIntrinsicsUnavailable { stream: String },

    /// Device option not supported
    #[error("option '{option}' is not supported by the device")]
    OptionUnsupported { option: String },

    // ===== Payload Errors =====
    /// Data parse error
    #[error("payload parse error for stream '{stream}': {message}")]
    PayloadParse { stream: String, message: String },

    /// Pixel layout the bridge cannot encode
    #[error("unsupported format for stream '{stream}': {bpp} bytes per pixel")]
    UnsupportedFormat { stream: String, bpp: u32 },

    // ===== Sync Errors =====
    /// Buffer overflow
    #[error("buffer overflow for '{channel}': depth={depth}, max={max}")]
    BufferOverflow {
        channel: String,
        depth: usize,
        max: usize,
    },

    // ===== Transform Errors =====
    /// No stream usable as geometry root
    #[error("no known base_stream found for transformations")]
    NoBaseStream,

    // ===== Bus Errors =====
    /// Publish failure on a channel
    #[error("publish on '{channel}' failed: {message}")]
    Publish { channel: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    pub fn extrinsics_unavailable(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::ExtrinsicsUnavailable {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create payload parse error
    pub fn payload_parse(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadParse {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            channel: channel.into(),
            message: message.into(),
        }
    }
}
