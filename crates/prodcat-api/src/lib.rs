//! prodcat-api: HTTP API layer
//!
//! This crate provides the API layer including:
//! - HTTP REST endpoints via Axum (single and batch product operations)
//! - Middleware (request tracing with ids, metrics)
//! - Observability (structured logging, Prometheus exposition)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                prodcat-api                   │
//! ├─────────────────────────────────────────────┤
//! │  http/          - HTTP REST endpoints       │
//! │  middleware/    - Request tracing, metrics  │
//! │  observability/ - Logging and Prometheus    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod middleware;
pub mod observability;
