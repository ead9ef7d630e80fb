//! Batch coordinator implementation.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use futures::FutureExt;
use prodcat_domain::validation::{validate_diff, validate_id, validate_product};
use prodcat_domain::{Product, ProductDiff, ProductId};
use prodcat_storage::{ProductStore, SaveOutcome, StorageError};
use tracing::{debug_span, error, instrument, warn, Instrument};

use super::types::{
    BatchError, BatchFailure, BatchOperation, BatchResponse, BatchResult, CreatedProduct,
    ItemOutcome, ItemResult, DEFAULT_MAX_BATCH_SIZE,
};

/// Sequence assigned to tasks whose join handle failed without reporting.
/// Such tasks sort after every task that did report.
const UNREPORTED_SEQUENCE: usize = usize::MAX;

/// Fans a batch of independent items out to a shared store.
///
/// Every item runs as its own `tokio::spawn` task calling the store's
/// single-item operation. All tasks are joined before the response is
/// built; a failing item never cancels its siblings and successful
/// mutations are never rolled back.
pub struct BatchCoordinator<S: ProductStore> {
    store: Arc<S>,
    max_batch_size: usize,
}

impl<S: ProductStore> Clone for BatchCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_batch_size: self.max_batch_size,
        }
    }
}

impl<S: ProductStore> BatchCoordinator<S> {
    /// Creates a coordinator with the default batch size limit.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_max_batch_size(store, DEFAULT_MAX_BATCH_SIZE)
    }

    /// Creates a coordinator with a custom batch size limit.
    pub fn with_max_batch_size(store: Arc<S>, max_batch_size: usize) -> Self {
        Self {
            store,
            max_batch_size,
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Checks the batch size bounds.
    pub fn validate_size(&self, len: usize) -> BatchResult<()> {
        if len == 0 {
            return Err(BatchError::EmptyBatch);
        }
        if len > self.max_batch_size {
            return Err(BatchError::BatchTooLarge {
                size: len,
                max: self.max_batch_size,
            });
        }
        Ok(())
    }

    /// Saves every product. Duplicates, within the batch or against
    /// existing records, are reported as `Conflict`.
    pub async fn create(
        &self,
        products: Vec<Product>,
    ) -> BatchResult<BatchResponse<CreatedProduct>> {
        self.validate_size(products.len())?;
        validate_items(&products, validate_product)?;

        Ok(self
            .run(BatchOperation::Create, products, |store, product| async move {
                match store.save(&product).await {
                    Ok(SaveOutcome::Created(id)) => {
                        ItemOutcome::Success(CreatedProduct { id, product })
                    }
                    Ok(SaveOutcome::AlreadyExists(id)) => ItemOutcome::Conflict { id },
                    Err(e) => storage_failure(BatchOperation::Create, e),
                }
            })
            .await)
    }

    /// Looks up every id.
    pub async fn get(&self, ids: Vec<ProductId>) -> BatchResult<BatchResponse<Product>> {
        self.validate_size(ids.len())?;
        validate_items(&ids, validate_id)?;

        Ok(self
            .run(BatchOperation::Get, ids, |store, id| async move {
                match store.get(&id).await {
                    Ok(Some(product)) => ItemOutcome::Success(product),
                    Ok(None) => ItemOutcome::NotFound { id },
                    Err(e) => storage_failure(BatchOperation::Get, e),
                }
            })
            .await)
    }

    /// Applies every diff. Unknown ids are reported as `NotFound` and are
    /// never created.
    pub async fn update(&self, diffs: Vec<ProductDiff>) -> BatchResult<BatchResponse<ProductId>> {
        self.validate_size(diffs.len())?;
        validate_items(&diffs, validate_diff)?;

        Ok(self
            .run(BatchOperation::Update, diffs, |store, diff| async move {
                match store.update(&diff).await {
                    Ok(true) => ItemOutcome::Success(diff.id),
                    Ok(false) => ItemOutcome::NotFound { id: diff.id },
                    Err(e) => storage_failure(BatchOperation::Update, e),
                }
            })
            .await)
    }

    /// Deletes every id.
    pub async fn delete(&self, ids: Vec<ProductId>) -> BatchResult<BatchResponse<ProductId>> {
        self.validate_size(ids.len())?;
        validate_items(&ids, validate_id)?;

        Ok(self
            .run(BatchOperation::Delete, ids, |store, id| async move {
                match store.delete(&id).await {
                    Ok(true) => ItemOutcome::Success(id),
                    Ok(false) => ItemOutcome::NotFound { id },
                    Err(e) => storage_failure(BatchOperation::Delete, e),
                }
            })
            .await)
    }

    /// The fan-out/join engine shared by every operation.
    ///
    /// Each result lands in the slot of its input position. Each task
    /// takes a completion sequence number when it finishes; the failure
    /// with the lowest sequence number becomes `first_failure`.
    #[instrument(
        skip_all,
        fields(
            operation = operation.as_str(),
            size = items.len(),
            backend = self.store.backend_name()
        )
    )]
    async fn run<I, T, F, Fut>(
        &self,
        operation: BatchOperation,
        items: Vec<I>,
        op: F,
    ) -> BatchResponse<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(Arc<S>, I) -> Fut,
        Fut: Future<Output = ItemOutcome<T>> + Send + 'static,
    {
        let start = Instant::now();
        let completed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let work = op(Arc::clone(&self.store), item);
                let completed = Arc::clone(&completed);
                // Child of the batch span, so item logs keep the request context.
                let span = debug_span!("batch_item", index);
                tokio::spawn(
                    async move {
                        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                            Ok(outcome) => outcome,
                            Err(panic) => ItemOutcome::InternalError {
                                message: format!(
                                    "item task panicked: {}",
                                    panic_message(&*panic)
                                ),
                            },
                        };
                        (completed.fetch_add(1, Ordering::SeqCst), outcome)
                    }
                    .instrument(span),
                )
            })
            .collect();

        // join_all yields in handle order, which is input order.
        let joined = join_all(handles).await;

        let mut results = Vec::with_capacity(joined.len());
        let mut first: Option<(usize, BatchFailure)> = None;

        for (index, join_result) in joined.into_iter().enumerate() {
            let (sequence, outcome) = match join_result {
                Ok(done) => done,
                Err(e) => (
                    UNREPORTED_SEQUENCE,
                    ItemOutcome::InternalError {
                        message: format!("item task failed: {e}"),
                    },
                ),
            };

            if let Some(kind) = outcome.failure_kind() {
                if first.map_or(true, |(seen, _)| sequence < seen) {
                    first = Some((sequence, BatchFailure { index, kind }));
                }
            }

            metrics::counter!(
                "prodcat_batch_items_total",
                "operation" => operation.as_str(),
                "outcome" => outcome.label()
            )
            .increment(1);

            results.push(ItemResult { index, outcome });
        }

        metrics::histogram!(
            "prodcat_batch_duration_seconds",
            "operation" => operation.as_str()
        )
        .record(start.elapsed().as_secs_f64());

        let first_failure = first.map(|(_, failure)| failure);
        if let Some(failure) = first_failure {
            warn!(
                index = failure.index,
                kind = failure.kind.as_str(),
                "batch completed with failures"
            );
        }

        BatchResponse {
            results,
            first_failure,
        }
    }
}

/// Runs per-item validation, reporting the first invalid index.
fn validate_items<I, E: std::fmt::Display>(
    items: &[I],
    validate: impl Fn(&I) -> Result<(), E>,
) -> BatchResult<()> {
    for (index, item) in items.iter().enumerate() {
        validate(item).map_err(|e| BatchError::InvalidItem {
            index,
            message: e.to_string(),
        })?;
    }
    Ok(())
}

fn storage_failure<T>(operation: BatchOperation, e: StorageError) -> ItemOutcome<T> {
    error!(operation = operation.as_str(), error = %e, "batch item storage failure");
    ItemOutcome::InternalError {
        message: e.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
