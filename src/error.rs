//! Error types for semantic cache operations
//!
//! Validation failures (`DimensionMismatch`, `InvalidArgument`) are caller
//! errors and are returned immediately. `StorageFailure` covers persistence
//! problems and rolled-back writes; the caller decides whether to retry.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Vector length differs from the engine's configured dimension
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Argument outside its valid domain (threshold, k, capacity)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation addressed an entry that does not exist
    #[error("cache entry not found: {0}")]
    NotFound(String),

    /// Underlying storage unavailable or a write had to be rolled back
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Serialization/Deserialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Embedding provider failed to produce a vector
    #[error("embedding provider error: {0}")]
    EmbeddingFailed(String),

    /// Rebuild confirmation did not match the pending request
    #[error("rebuild rejected: {0}")]
    RebuildRejected(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Whether this error was caused by the caller's input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CacheError::DimensionMismatch { .. }
                | CacheError::InvalidArgument(_)
                | CacheError::RebuildRejected(_)
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::StorageFailure(e.to_string())
    }
}
