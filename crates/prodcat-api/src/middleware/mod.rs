//! API middleware.
//!
//! Includes:
//! - Request tracing: `x-request-id` propagation and a per-request span
//!   naming the catalog operation
//! - HTTP metrics collection

mod metrics;
mod trace;

pub use metrics::{MetricsLayer, RequestMetrics};
pub use trace::{CatalogOperation, RequestTraceLayer, MAX_REQUEST_ID_LEN, REQUEST_ID_HEADER};
