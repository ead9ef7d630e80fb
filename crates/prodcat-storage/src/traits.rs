//! ProductStore trait definition.

use std::sync::Arc;

use async_trait::async_trait;
use prodcat_domain::{Product, ProductDiff, ProductId};

use crate::error::{HealthStatus, StorageResult};

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The product was stored under this id.
    Created(ProductId),
    /// A product with identical content already exists. Nothing was written.
    AlreadyExists(ProductId),
}

impl SaveOutcome {
    pub fn id(&self) -> &ProductId {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::AlreadyExists(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }
}

/// Abstract storage interface for catalog products.
///
/// Implementations must be thread-safe (Send + Sync): the batch coordinator
/// invokes single-item operations from many tasks at once against one shared
/// store, and each implementation is responsible for its own
/// synchronization.
///
/// A successful `get` always observes a whole record as written by the most
/// recent `save` or `update`. Concurrent updates of the same id are
/// last-write-wins on the whole record.
#[async_trait]
pub trait ProductStore: Send + Sync + 'static {
    /// Stores a product under its content id. Never overwrites.
    async fn save(&self, product: &Product) -> StorageResult<SaveOutcome>;

    /// Looks up a product. `Ok(None)` means no record with that id.
    async fn get(&self, id: &ProductId) -> StorageResult<Option<Product>>;

    /// Applies a patch. Returns `false` if the id does not exist, in which
    /// case no record is created.
    async fn update(&self, diff: &ProductDiff) -> StorageResult<bool>;

    /// Removes a product. Returns whether a record existed.
    async fn delete(&self, id: &ProductId) -> StorageResult<bool>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Short backend name used in logs and metric labels.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: ProductStore + ?Sized> ProductStore for Arc<S> {
    async fn save(&self, product: &Product) -> StorageResult<SaveOutcome> {
        (**self).save(product).await
    }

    async fn get(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        (**self).get(id).await
    }

    async fn update(&self, diff: &ProductDiff) -> StorageResult<bool> {
        (**self).update(diff).await
    }

    async fn delete(&self, id: &ProductId) -> StorageResult<bool> {
        (**self).delete(id).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        (**self).health_check().await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
