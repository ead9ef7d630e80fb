//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Storage-specific errors.
///
/// "Not found" and "already exists" are not errors at this layer: they are
/// reported through `Option`, `bool` and [`crate::SaveOutcome`] so that the
/// batch coordinator can classify them per item.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable (database pool or remote service).
    #[error("storage connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Operation exceeded its deadline.
    #[error("storage operation '{operation}' timed out after {timeout:?}")]
    QueryTimeout { operation: String, timeout: Duration },

    /// Remote store answered with an unexpected status.
    #[error("remote store returned {status}: {message}")]
    RemoteError { status: u16, message: String },

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Input the backend cannot represent.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Health probe failed.
    #[error("health check failed: {message}")]
    HealthCheckFailed { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

impl StorageError {
    /// Returns true if the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionError { .. } | StorageError::HealthCheckFailed { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Health status returned by [`crate::ProductStore::health_check`].
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    pub message: Option<String>,
}
