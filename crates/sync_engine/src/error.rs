//! Sync engine error types

use thiserror::Error;

/// Errors raised on the inertial path
#[derive(Debug, Error)]
pub enum SyncError {
    /// Paused queue is full; downstream consumer is stalled
    #[error("queue overflow on '{sink}': depth={depth}, max={max}")]
    QueueOverflow {
        sink: String,
        depth: usize,
        max: usize,
    },

    /// Publish failure from the bus
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl From<SyncError> for contracts::ContractError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::QueueOverflow { sink, depth, max } => Self::BufferOverflow {
                channel: sink,
                depth,
                max,
            },
            SyncError::Contract(e) => e,
        }
    }
}

/// Result alias for the sync engine
pub type SyncResult<T> = std::result::Result<T, SyncError>;
