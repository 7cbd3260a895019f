//! Deployment error types.

use stager_staging::StagingError;
use thiserror::Error;

/// Deployment and commit errors.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("object address required for upgrade but none was given")]
    MissingObjectAddress,

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("object {address} is owned by {owner}, not {caller}")]
    NotObjectOwner {
        address: String,
        owner: String,
        caller: String,
    },

    #[error("deployment rejected: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DeployError {
    /// Stable code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Staging(StagingError::LengthMismatch { .. }) => "length_mismatch",
            Self::Staging(StagingError::MissingChunk { .. }) => "missing_chunk",
            Self::Staging(StagingError::NotFound(_)) => "not_found",
            Self::Staging(StagingError::LimitExceeded(_)) => "limit_exceeded",
            Self::Staging(StagingError::InvalidPlan(_)) => "invalid_plan",
            Self::MissingObjectAddress => "missing_object_address",
            Self::ObjectNotFound(_) => "object_not_found",
            Self::NotObjectOwner { .. } => "not_object_owner",
            Self::Rejected(_) => "rejected",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Config(_) => "config_error",
        }
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for deployment operations.
pub type DeployResult<T> = std::result::Result<T, DeployError>;
