//! Product input validation.
//!
//! Every check here runs before a request reaches a store, so storage
//! backends can assume well-formed input.

use crate::error::{DomainError, DomainResult};
use crate::model::{Product, ProductDiff, ProductId, ProductPatch};

/// Maximum length of `name` and `manufacturer`, in characters.
pub const MAX_TEXT_LEN: usize = 256;

/// Maximum number of tags on a product.
pub const MAX_TAGS: usize = 32;

/// Maximum length of a single tag, in characters.
pub const MAX_TAG_LEN: usize = 64;

/// Largest stock value accepted. Bounded so it fits a signed 64-bit column.
pub const MAX_STOCK: u64 = i64::MAX as u64;

/// Validates a product submitted for creation.
pub fn validate_product(product: &Product) -> DomainResult<()> {
    validate_text("name", &product.name)?;
    validate_text("manufacturer", &product.manufacturer)?;
    validate_price(product.price)?;
    validate_stock(product.stock)?;
    validate_tags(&product.tags)
}

/// Validates a diff submitted for update.
pub fn validate_diff(diff: &ProductDiff) -> DomainResult<()> {
    validate_id(&diff.id)?;
    validate_patch(&diff.diff)
}

/// Validates the patch part of a diff.
pub fn validate_patch(patch: &ProductPatch) -> DomainResult<()> {
    if patch.is_empty() {
        return Err(DomainError::InvalidDiff {
            message: "diff must change at least one of price, stock, tags".to_string(),
        });
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    if let Some(stock) = patch.stock {
        validate_stock(stock)?;
    }
    if let Some(ref tags) = patch.tags {
        validate_tags(tags)?;
    }
    Ok(())
}

/// Validates an identifier. `ProductId::parse` already rejects blank ids;
/// this catches ids built through deserialization.
pub fn validate_id(id: &ProductId) -> DomainResult<()> {
    if id.as_str().trim().is_empty() {
        return Err(DomainError::InvalidId {
            value: id.as_str().to_string(),
        });
    }
    Ok(())
}

fn validate_text(field: &'static str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidProduct {
            field,
            message: "cannot be empty".to_string(),
        });
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(DomainError::InvalidProduct {
            field,
            message: format!("exceeds {} characters", MAX_TEXT_LEN),
        });
    }
    Ok(())
}

fn validate_price(price: f64) -> DomainResult<()> {
    if !price.is_finite() {
        return Err(DomainError::InvalidProduct {
            field: "price",
            message: "must be a finite number".to_string(),
        });
    }
    if price < 0.0 {
        return Err(DomainError::InvalidProduct {
            field: "price",
            message: "cannot be negative".to_string(),
        });
    }
    Ok(())
}

fn validate_stock(stock: u64) -> DomainResult<()> {
    if stock > MAX_STOCK {
        return Err(DomainError::InvalidProduct {
            field: "stock",
            message: format!("exceeds {}", MAX_STOCK),
        });
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> DomainResult<()> {
    if tags.len() > MAX_TAGS {
        return Err(DomainError::InvalidProduct {
            field: "tags",
            message: format!("at most {} tags allowed", MAX_TAGS),
        });
    }
    for (i, tag) in tags.iter().enumerate() {
        if tag.trim().is_empty() {
            return Err(DomainError::InvalidProduct {
                field: "tags",
                message: format!("tag {} is empty", i),
            });
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(DomainError::InvalidProduct {
                field: "tags",
                message: format!("tag {} exceeds {} characters", i, MAX_TAG_LEN),
            });
        }
    }
    Ok(())
}
