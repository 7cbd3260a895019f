//! Staging error types.

use stager_core::OwnerId;
use thiserror::Error;

/// Staging operation errors.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("length mismatch: {indices} indices but {chunks} chunks")]
    LengthMismatch { indices: usize, chunks: usize },

    #[error("missing chunk at index {index} (last index {last_index})")]
    MissingChunk { index: u16, last_index: u16 },

    #[error("no staging area for owner {0}")]
    NotFound(OwnerId),

    #[error("staging limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("invalid call plan: {0}")]
    InvalidPlan(String),
}

/// Result type for staging operations.
pub type StagingResult<T> = std::result::Result<T, StagingError>;
