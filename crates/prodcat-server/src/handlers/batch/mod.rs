//! Concurrent batch coordinator.
//!
//! Takes N independent items from one request, runs one task per item
//! against a shared store, and merges the outcomes into one response:
//!
//! 1. **Validation**: empty, oversized or malformed batches are rejected
//!    before any task is dispatched
//! 2. **Fan-out**: one `tokio::spawn` per item on the multi-thread runtime
//! 3. **Join**: every task is awaited; nothing is cancelled or rolled back
//! 4. **Merge**: outcomes are placed by input index, and the first failure
//!    in completion order decides the batch-level status
//!
//! The coordinator applies no deadline of its own. Callers bound a batch
//! externally, e.g. with the HTTP request timeout.

mod coordinator;
mod types;

pub use coordinator::BatchCoordinator;
pub use types::{
    BatchError, BatchFailure, BatchOperation, BatchResponse, BatchResult, CreatedProduct,
    FailureKind, ItemOutcome, ItemResult, DEFAULT_MAX_BATCH_SIZE,
};
