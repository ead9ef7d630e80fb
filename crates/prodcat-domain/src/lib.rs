//! prodcat-domain: Product catalog domain model
//!
//! This crate contains the storage-independent catalog types:
//! - Products and their content-derived identifiers
//! - Partial product diffs (price, stock, tags)
//! - Input validation shared by every storage backend and the HTTP layer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               prodcat-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Product, ProductId, diffs    │
//! │  validation/ - Input bounds and checks      │
//! │  error.rs    - DomainError                  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod model;
pub mod validation;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use model::{Product, ProductDiff, ProductId, ProductPatch, ProductRecord};
