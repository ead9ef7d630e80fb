//! Domain error types for catalog input.

use thiserror::Error;

/// Domain-specific errors. All of them describe caller input that cannot be
/// accepted, so the API layer maps every variant to 400 Bad Request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A product field failed validation.
    #[error("invalid product {field}: {message}")]
    InvalidProduct {
        field: &'static str,
        message: String,
    },

    /// A product diff failed validation.
    #[error("invalid product diff: {message}")]
    InvalidDiff { message: String },

    /// A product identifier is empty or malformed.
    #[error("invalid product id: {value:?}")]
    InvalidId { value: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
