//! Application state for HTTP handlers.

use std::sync::Arc;

use prodcat_server::handlers::batch::BatchCoordinator;
use prodcat_storage::ProductStore;

/// Application state shared across all HTTP handlers.
///
/// The store is constructed by the caller and injected here; the single
/// endpoints use it directly while the batch endpoints go through the
/// coordinator, which shares the same `Arc`.
///
/// # Type Parameters
///
/// * `S` - The storage backend implementing `ProductStore`
#[derive(Clone)]
pub struct AppState<S: ProductStore> {
    /// The storage backend.
    pub store: Arc<S>,
    /// The batch coordinator fanning batch requests out to `store`.
    pub coordinator: Arc<BatchCoordinator<S>>,
}

impl<S: ProductStore> AppState<S> {
    /// Creates a new application state with the default batch size limit.
    pub fn new(store: Arc<S>) -> Self {
        let coordinator = BatchCoordinator::new(Arc::clone(&store));
        Self::with_coordinator(store, coordinator)
    }

    /// Creates a new application state with a custom batch size limit.
    pub fn with_max_batch_size(store: Arc<S>, max_batch_size: usize) -> Self {
        let coordinator = BatchCoordinator::with_max_batch_size(Arc::clone(&store), max_batch_size);
        Self::with_coordinator(store, coordinator)
    }

    fn with_coordinator(store: Arc<S>, coordinator: BatchCoordinator<S>) -> Self {
        Self {
            store,
            coordinator: Arc::new(coordinator),
        }
    }
}
