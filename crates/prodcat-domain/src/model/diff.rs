//! Partial product updates.

use serde::{Deserialize, Serialize};

use super::product::ProductId;

/// Fields of a product that may be patched.
///
/// Name and manufacturer are identity fields and cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ProductPatch {
    /// Returns true if the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.stock.is_none() && self.tags.is_none()
    }
}

/// A patch targeted at one product.
///
/// Wire form: `{"id": "...", "diff": {"price": 1.0, "stock": 2, "tags": []}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDiff {
    #[serde(alias = "ID")]
    pub id: ProductId,
    #[serde(alias = "Diff")]
    pub diff: ProductPatch,
}

impl ProductDiff {
    pub fn new(id: ProductId, diff: ProductPatch) -> Self {
        Self { id, diff }
    }
}
