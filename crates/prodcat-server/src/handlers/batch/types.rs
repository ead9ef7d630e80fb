//! Data types for batch operations.

use prodcat_domain::{Product, ProductId};

/// Default upper bound on items per batch request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// The store operation a batch fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOperation {
    Create,
    Get,
    Update,
    Delete,
}

impl BatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOperation::Create => "create",
            BatchOperation::Get => "get",
            BatchOperation::Update => "update",
            BatchOperation::Delete => "delete",
        }
    }
}

/// Success payload of one created product.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedProduct {
    pub id: ProductId,
    pub product: Product,
}

/// Classified result of one item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    /// The store operation succeeded.
    Success(T),
    /// A product with the same id already exists (create only).
    Conflict { id: ProductId },
    /// No product with this id (get, update, delete).
    NotFound { id: ProductId },
    /// The store failed, or the task running the item panicked.
    InternalError { message: String },
}

impl<T> ItemOutcome<T> {
    /// Failure class of this outcome, `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ItemOutcome::Success(_) => None,
            ItemOutcome::Conflict { .. } => Some(FailureKind::Conflict),
            ItemOutcome::NotFound { .. } => Some(FailureKind::NotFound),
            ItemOutcome::InternalError { .. } => Some(FailureKind::InternalError),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success(_))
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self.failure_kind() {
            None => "success",
            Some(kind) => kind.as_str(),
        }
    }
}

/// Failure classes that decide the batch-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Conflict,
    NotFound,
    InternalError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Conflict => "conflict",
            FailureKind::NotFound => "not_found",
            FailureKind::InternalError => "internal_error",
        }
    }
}

/// Outcome of the item at `index` in the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult<T> {
    pub index: usize,
    pub outcome: ItemOutcome<T>,
}

/// The failure that determines the batch-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchFailure {
    /// Input position of the failed item.
    pub index: usize,
    pub kind: FailureKind,
}

/// Aggregate response of a batch.
///
/// `results` has exactly one entry per input item, in input order,
/// regardless of the order in which items completed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse<T> {
    pub results: Vec<ItemResult<T>>,
    /// First failure observed in completion order, if any item failed.
    pub first_failure: Option<BatchFailure>,
}

impl<T> BatchResponse<T> {
    pub fn is_success(&self) -> bool {
        self.first_failure.is_none()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}

/// Errors that reject a batch before any item is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// The batch request is empty.
    #[error("batch request cannot be empty")]
    EmptyBatch,

    /// The batch request exceeds the maximum allowed size.
    #[error("batch size {size} exceeds maximum allowed {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// An item failed input validation.
    #[error("invalid item at index {index}: {message}")]
    InvalidItem { index: usize, message: String },
}

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;
