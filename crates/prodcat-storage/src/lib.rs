//! prodcat-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for the product catalog:
//! - ProductStore trait for single-item operations
//! - In-memory implementation guarded by one reader/writer lock
//! - PostgreSQL implementation for persistent storage
//! - Remote implementation delegating to another catalog instance over HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              prodcat-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - ProductStore trait           │
//! │  memory.rs   - In-memory implementation     │
//! │  postgres.rs - PostgreSQL implementation    │
//! │  remote.rs   - HTTP-delegating client       │
//! │  query.rs    - Deadline + metrics wrapper   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
mod query;
pub mod remote;
pub mod traits;

// Re-export commonly used types
pub use error::{HealthStatus, StorageError, StorageResult};
pub use memory::MemoryProductStore;
pub use postgres::{PostgresConfig, PostgresProductStore};
pub use remote::{RemoteConfig, RemoteProductStore};
pub use traits::{ProductStore, SaveOutcome};
