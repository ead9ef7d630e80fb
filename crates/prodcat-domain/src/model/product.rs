//! Product and identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::diff::ProductPatch;
use crate::error::{DomainError, DomainResult};

/// Identifier of a catalog product.
///
/// Ids produced by [`Product::id`] are the lowercase hex SHA-256 of the
/// product content, so the id doubles as a content hash. Ids received from
/// clients are opaque strings and only need to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Parses a client-supplied identifier.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidId { value });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Product content as submitted by clients.
///
/// Any `id` field in the incoming JSON is ignored: the identifier is always
/// derived from content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub manufacturer: String,
    pub price: f64,
    pub stock: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Product {
    /// Creates a new product.
    pub fn new(
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        price: f64,
        stock: u64,
        tags: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            manufacturer: manufacturer.into(),
            price,
            stock,
            tags,
        }
    }

    /// Derives the content identifier.
    ///
    /// Every field is length-prefixed before hashing so that no two distinct
    /// products share an encoding (e.g. name "ab" + manufacturer "c" vs
    /// name "a" + manufacturer "bc"). Tag order is significant.
    pub fn id(&self) -> ProductId {
        let mut hasher = Sha256::new();
        hash_bytes(&mut hasher, self.name.as_bytes());
        hash_bytes(&mut hasher, self.manufacturer.as_bytes());
        hasher.update(canonical_price_bits(self.price).to_le_bytes());
        hasher.update(self.stock.to_le_bytes());
        hasher.update((self.tags.len() as u64).to_le_bytes());
        for tag in &self.tags {
            hash_bytes(&mut hasher, tag.as_bytes());
        }
        ProductId(hex::encode(hasher.finalize()))
    }

    /// Applies a patch in place. Absent patch fields keep their value.
    pub fn apply(&mut self, patch: &ProductPatch) {
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
    }
}

fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

// -0.0 and 0.0 compare equal and must hash equal.
fn canonical_price_bits(price: f64) -> u64 {
    if price == 0.0 {
        0.0f64.to_bits()
    } else {
        price.to_bits()
    }
}

/// A stored product together with its identifier.
///
/// Serializes flat: `{"id": "...", "name": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    #[serde(flatten)]
    pub product: Product,
}

impl ProductRecord {
    /// Creates a record keyed by the product's content id.
    pub fn new(product: Product) -> Self {
        Self {
            id: product.id(),
            product,
        }
    }

    /// Creates a record with an explicit id (used when loading from storage).
    pub fn with_id(id: ProductId, product: Product) -> Self {
        Self { id, product }
    }
}
