//! In-memory storage implementation.
//!
//! All products live in one `HashMap` behind a single `tokio::sync::RwLock`.
//! `save`, `update` and `delete` take the write lock; `get` takes the read
//! lock. A reader therefore never sees a half-applied patch, and two
//! concurrent patches of the same id serialize (last write wins).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prodcat_domain::{Product, ProductDiff, ProductId};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{HealthStatus, StorageResult};
use crate::traits::{ProductStore, SaveOutcome};

/// In-memory implementation of ProductStore.
///
/// Lives for the lifetime of the process. Never fails operationally.
#[derive(Debug, Default)]
pub struct MemoryProductStore {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl MemoryProductStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored products.
    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns true if no products are stored.
    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    #[instrument(skip(self, product))]
    async fn save(&self, product: &Product) -> StorageResult<SaveOutcome> {
        let id = product.id();
        let mut products = self.products.write().await;
        if products.contains_key(&id) {
            debug!(%id, "product already exists");
            return Ok(SaveOutcome::AlreadyExists(id));
        }
        products.insert(id.clone(), product.clone());
        Ok(SaveOutcome::Created(id))
    }

    async fn get(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        Ok(self.products.read().await.get(id).cloned())
    }

    #[instrument(skip(self, diff), fields(id = %diff.id))]
    async fn update(&self, diff: &ProductDiff) -> StorageResult<bool> {
        let mut products = self.products.write().await;
        match products.get_mut(&diff.id) {
            Some(product) => {
                product.apply(&diff.diff);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &ProductId) -> StorageResult<bool> {
        Ok(self.products.write().await.remove(id).is_some())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            latency: Duration::ZERO,
            message: Some("in-memory storage".to_string()),
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
