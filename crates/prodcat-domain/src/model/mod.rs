//! Catalog model types.

mod diff;
mod product;

#[cfg(test)]
mod product_proptest;

pub use diff::{ProductDiff, ProductPatch};
pub use product::{Product, ProductId, ProductRecord};
