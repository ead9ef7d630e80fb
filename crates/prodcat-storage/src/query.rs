//! Deadline and metrics wrapper shared by the networked backends.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{StorageError, StorageResult};

/// Wraps an async storage operation with a timeout and records metrics.
///
/// If the operation exceeds `timeout`, returns
/// `StorageError::QueryTimeout` naming the operation.
///
/// # Metrics
/// - `prodcat_storage_query_duration_seconds` - Histogram of operation durations
/// - `prodcat_storage_query_timeout_total` - Counter of timeout events
pub(crate) async fn execute_with_timeout_and_metrics<T, F>(
    backend: &'static str,
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, future).await;
    let duration = start.elapsed().as_secs_f64();

    let (status, final_result) = match result {
        Ok(Ok(value)) => ("success", Ok(value)),
        Ok(Err(StorageError::QueryTimeout { .. })) | Err(_) => (
            "timeout",
            Err(StorageError::QueryTimeout {
                operation: operation.to_string(),
                timeout,
            }),
        ),
        Ok(Err(e)) => ("error", Err(e)),
    };

    metrics::histogram!(
        "prodcat_storage_query_duration_seconds",
        "operation" => operation,
        "backend" => backend,
        "status" => status
    )
    .record(duration);

    if status == "timeout" {
        metrics::counter!(
            "prodcat_storage_query_timeout_total",
            "operation" => operation,
            "backend" => backend
        )
        .increment(1);
    }

    final_result
}
