//! prodcat-server: Batch coordination and configuration
//!
//! This crate contains the business logic layer between the HTTP surface
//! and the stores:
//! - Batch coordinator fanning create/get/update/delete out per item
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               prodcat-server                 │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  handlers/   - Request handlers             │
//! │    batch/    - Fan-out/join coordinator     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod handlers;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::batch::BatchCoordinator;
