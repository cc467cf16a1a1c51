//! Muninn error types

use std::time::Duration;

use crate::types::AnalysisKey;

/// Failures of the generative model adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Output could not be parsed into the expected shape.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// The remote API reported an error.
    #[error("upstream model error: {0}")]
    Upstream(String),

    /// The remote service could not be reached.
    #[error("model transport error: {0}")]
    Transport(String),

    /// Output parsed but the expected result field was absent.
    #[error("model response is missing field '{0}'")]
    MissingField(&'static str),
}

/// Failures of a [`KeyValueStore`](crate::store::KeyValueStore).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// The key already holds a value; the existing value is untouched.
    #[error("key already exists: {0}")]
    KeyConflict(AnalysisKey),

    /// Backend unreachable or erroring.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Muninn error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum MuninnError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A payload did not satisfy the output schema.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Fewer than half of a batch succeeded.
    #[error("batch failed: {succeeded} succeeded, {failed} failed")]
    BatchBelowThreshold { succeeded: usize, failed: usize },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A spawned resolution task panicked or was aborted.
    #[error("resolution task failed: {0}")]
    TaskFailed(String),
}

impl MuninnError {
    /// Whether this is a duplicate-key write rejection.
    pub fn is_key_conflict(&self) -> bool {
        matches!(self, MuninnError::Storage(StorageError::KeyConflict(_)))
    }

    pub fn is_model_error(&self) -> bool {
        matches!(self, MuninnError::Model(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, MuninnError::Storage(_))
    }
}

impl From<serde_json::Error> for MuninnError {
    fn from(err: serde_json::Error) -> Self {
        MuninnError::Json(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MuninnError {
    fn from(err: tokio::task::JoinError) -> Self {
        MuninnError::TaskFailed(err.to_string())
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
