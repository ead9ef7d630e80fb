//! Prometheus metrics infrastructure.
//!
//! Metrics are recorded through the `metrics` facade and rendered by
//! `metrics-exporter-prometheus`.
//!
//! # Metrics Exposed
//!
//! - `prodcat_http_requests_total` - HTTP requests by method, path, status class
//! - `prodcat_http_request_duration_seconds` - HTTP request duration histogram
//! - `prodcat_batch_items_total` - Batch items by operation and outcome
//! - `prodcat_batch_duration_seconds` - Batch duration histogram by operation
//! - `prodcat_storage_query_duration_seconds` - Store query duration histogram
//! - `prodcat_storage_query_timeout_total` - Store query timeouts

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Shared state containing the Prometheus handle for metrics rendering.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Renders the current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Error type for metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: recorder already installed")]
    AlreadyInstalled,
}

/// Installs the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|_| MetricsError::AlreadyInstalled)?;

    register_default_metrics();

    Ok(MetricsState::new(handle))
}

fn register_default_metrics() {
    metrics::describe_counter!(
        "prodcat_http_requests_total",
        "Total number of HTTP requests"
    );
    metrics::describe_histogram!(
        "prodcat_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "prodcat_batch_items_total",
        "Total number of batch items by operation and outcome"
    );
    metrics::describe_histogram!(
        "prodcat_batch_duration_seconds",
        "Batch duration in seconds from dispatch to last join"
    );

    metrics::describe_histogram!(
        "prodcat_storage_query_duration_seconds",
        "Storage query duration in seconds by operation, backend, and status"
    );
    metrics::describe_counter!(
        "prodcat_storage_query_timeout_total",
        "Total number of storage query timeouts by operation and backend"
    );
    metrics::describe_histogram!(
        "prodcat_storage_health_check_duration_seconds",
        "Storage health check duration in seconds by backend and status"
    );
    metrics::describe_gauge!(
        "prodcat_storage_pool_connections",
        "Number of database pool connections by backend and state"
    );
}

/// Prometheus exposition format content type.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Handler for the `/metrics` endpoint.
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.render())
}
