//! Remote storage implementation.
//!
//! Delegates every operation to the single-item endpoints of another
//! catalog instance (`/store/product/single`). The remote side owns the
//! data and its synchronization; this client adds only a per-request
//! deadline and status mapping.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use prodcat_domain::{Product, ProductDiff, ProductId, ProductRecord};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::query::execute_with_timeout_and_metrics;
use crate::traits::{ProductStore, SaveOutcome};

const BACKEND: &str = "remote";

const SINGLE_PATH: &str = "/store/product/single";

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Remote store configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the store service, e.g. `http://localhost:8081`.
    pub base_url: String,
    /// Deadline for one request, including reading the body.
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdBody {
    id: ProductId,
}

/// HTTP-delegating implementation of ProductStore.
#[derive(Debug, Clone)]
pub struct RemoteProductStore {
    client: Client,
    single_url: String,
    health_url: String,
    timeout: Duration,
}

impl RemoteProductStore {
    /// Creates a store with the given configuration.
    pub fn from_config(config: &RemoteConfig) -> StorageResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::InternalError {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client, &config.base_url, timeout))
    }

    /// Creates a store from a base URL with default settings.
    pub fn from_url(base_url: &str) -> StorageResult<Self> {
        Self::from_config(&RemoteConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    /// Creates a store around an existing client.
    pub fn with_client(client: Client, base_url: &str, timeout: Duration) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            client,
            single_url: format!("{base}{SINGLE_PATH}"),
            health_url: format!("{base}/health"),
            timeout,
        }
    }

    async fn execute<T, F>(&self, operation: &'static str, future: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        execute_with_timeout_and_metrics(BACKEND, operation, self.timeout, future).await
    }

    fn transport_error(&self, operation: &'static str, e: reqwest::Error) -> StorageError {
        if e.is_timeout() {
            StorageError::QueryTimeout {
                operation: operation.to_string(),
                timeout: self.timeout,
            }
        } else if e.is_decode() {
            StorageError::SerializationError {
                message: format!("{operation}: invalid response body: {e}"),
            }
        } else {
            StorageError::ConnectionError {
                message: format!("{operation}: {e}"),
            }
        }
    }

    async fn unexpected(&self, operation: &'static str, response: Response) -> StorageError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        debug!(operation, %status, "unexpected remote status");
        StorageError::RemoteError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ProductStore for RemoteProductStore {
    #[instrument(skip(self, product))]
    async fn save(&self, product: &Product) -> StorageResult<SaveOutcome> {
        self.execute("save", async {
            let response = self
                .client
                .post(&self.single_url)
                .json(product)
                .send()
                .await
                .map_err(|e| self.transport_error("save", e))?;

            match response.status() {
                StatusCode::CREATED => {
                    let body: IdBody = response
                        .json()
                        .await
                        .map_err(|e| self.transport_error("save", e))?;
                    Ok(SaveOutcome::Created(body.id))
                }
                StatusCode::CONFLICT => Ok(SaveOutcome::AlreadyExists(product.id())),
                _ => Err(self.unexpected("save", response).await),
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        self.execute("get", async {
            let response = self
                .client
                .get(&self.single_url)
                .query(&[("id", id.as_str())])
                .send()
                .await
                .map_err(|e| self.transport_error("get", e))?;

            match response.status() {
                StatusCode::OK => {
                    let record: ProductRecord = response
                        .json()
                        .await
                        .map_err(|e| self.transport_error("get", e))?;
                    Ok(Some(record.product))
                }
                StatusCode::NOT_FOUND => Ok(None),
                _ => Err(self.unexpected("get", response).await),
            }
        })
        .await
    }

    #[instrument(skip(self, diff), fields(id = %diff.id))]
    async fn update(&self, diff: &ProductDiff) -> StorageResult<bool> {
        self.execute("update", async {
            let response = self
                .client
                .patch(&self.single_url)
                .json(diff)
                .send()
                .await
                .map_err(|e| self.transport_error("update", e))?;

            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                _ => Err(self.unexpected("update", response).await),
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &ProductId) -> StorageResult<bool> {
        self.execute("delete", async {
            let response = self
                .client
                .delete(&self.single_url)
                .query(&[("id", id.as_str())])
                .send()
                .await
                .map_err(|e| self.transport_error("delete", e))?;

            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                _ => Err(self.unexpected("delete", response).await),
            }
        })
        .await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| StorageError::HealthCheckFailed {
                message: format!("remote store unreachable: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(StorageError::HealthCheckFailed {
                message: format!("remote store returned {}", response.status()),
            });
        }

        Ok(HealthStatus {
            healthy: true,
            latency: start.elapsed(),
            message: Some(format!("remote store at {}", self.health_url)),
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
