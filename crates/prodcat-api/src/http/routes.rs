//! HTTP route definitions and handlers.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, warn};

use prodcat_domain::error::DomainError;
use prodcat_domain::validation::{validate_diff, validate_product};
use prodcat_domain::{Product, ProductDiff, ProductId, ProductRecord};
use prodcat_server::handlers::batch::{
    BatchError, BatchFailure, BatchResponse, FailureKind, ItemOutcome,
};
use prodcat_storage::{ProductStore, SaveOutcome, StorageError};

use super::state::AppState;
use crate::observability::{metrics_handler, MetricsState};

/// JSON extractor that returns 400 Bad Request instead of 422 Unprocessable
/// Entity for deserialization errors.
///
/// Preserves 413 Payload Too Large for body limit errors.
pub struct JsonBadRequest<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBadRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBadRequest(value)),
            Err(rejection) => {
                use axum::extract::rejection::JsonRejection;

                // Body limit errors surface as a BytesRejection carrying 413
                let status = match &rejection {
                    JsonRejection::BytesRejection(_)
                        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE =>
                    {
                        StatusCode::PAYLOAD_TOO_LARGE
                    }
                    _ => StatusCode::BAD_REQUEST,
                };

                let message = rejection.body_text();
                let error = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    ApiError::payload_too_large(message)
                } else {
                    ApiError::validation_error(message)
                };

                Err((status, Json(error)))
            }
        }
    }
}

/// Every `id` query parameter, in request order.
///
/// `?id=a&id=b` yields `["a", "b"]`; other parameters are ignored.
pub struct IdParams(pub Vec<String>);

#[async_trait]
impl<S> FromRequestParts<S> for IdParams
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::validation_error(rejection.body_text())),
                )
            })?;

        Ok(IdParams(
            pairs
                .into_iter()
                .filter(|(key, _)| key == "id")
                .map(|(_, value)| value)
                .collect(),
        ))
    }
}

/// Default request body size limit (1MB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

fn api_routes<S: ProductStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route(
            "/store/product/single",
            post(create_product::<S>)
                .get(get_product::<S>)
                .patch(update_product::<S>)
                .delete(delete_product::<S>),
        )
        .route(
            "/store/product/batch",
            post(batch_create::<S>)
                .get(batch_get::<S>)
                .patch(batch_update::<S>)
                .delete(batch_delete::<S>),
        )
}

/// Creates the HTTP router with the product endpoints, `/health` and `/ready`.
///
/// Applies the default body size limit (1MB).
pub fn create_router<S: ProductStore>(state: AppState<S>) -> Router {
    create_router_with_body_limit(state, DEFAULT_BODY_LIMIT)
}

/// Creates the HTTP router with a custom body size limit.
pub fn create_router_with_body_limit<S: ProductStore>(
    state: AppState<S>,
    body_limit: usize,
) -> Router {
    let shared_state = Arc::new(state);
    api_routes::<S>()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<S>))
        .with_state(shared_state)
        .layer(RequestBodyLimitLayer::new(body_limit))
}

/// Creates the HTTP router with observability endpoints.
///
/// This includes the product endpoints plus:
/// - `/metrics` - Prometheus metrics endpoint
/// - `/health` - Basic health check
/// - `/ready` - Readiness check (store health)
pub fn create_router_with_observability<S: ProductStore>(
    state: AppState<S>,
    metrics_state: MetricsState,
) -> Router {
    create_router_with_observability_and_limit(state, metrics_state, DEFAULT_BODY_LIMIT)
}

/// Creates the HTTP router with observability endpoints and a custom body size limit.
///
/// # Arguments
///
/// * `state` - Application state with storage backend
/// * `metrics_state` - Metrics state for Prometheus endpoint
/// * `body_limit` - Maximum request body size in bytes
pub fn create_router_with_observability_and_limit<S: ProductStore>(
    state: AppState<S>,
    metrics_state: MetricsState,
    body_limit: usize,
) -> Router {
    let shared_state = Arc::new(state);

    let api_router = api_routes::<S>()
        .route("/ready", get(readiness_check::<S>))
        .with_state(shared_state)
        // Body limit applies to API routes only
        .layer(RequestBodyLimitLayer::new(body_limit));

    let observability_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .with_state(metrics_state);

    api_router.merge(observability_router)
}

// ============================================================
// Error Handling
// ============================================================

/// Error codes carried in the `code` field of every error body.
///
/// Each code maps to one HTTP status in [`ApiError::into_response`]:
///
/// | Code | Status |
/// |------|--------|
/// | [`VALIDATION_ERROR`] | 400 |
/// | [`NOT_FOUND`] | 404 |
/// | [`ALREADY_EXISTS`] | 409 |
/// | [`PAYLOAD_TOO_LARGE`] | 413 |
/// | [`INTERNAL_ERROR`] | 500 |
/// | [`SERVICE_UNAVAILABLE`] | 503 |
/// | [`TIMEOUT`] | 504 |
pub mod error_codes {
    /// Missing or malformed input.
    pub const VALIDATION_ERROR: &str = "validation_error";
    /// No product with the requested id.
    pub const NOT_FOUND: &str = "not_found";
    /// A product with the same id already exists.
    pub const ALREADY_EXISTS: &str = "already_exists";
    /// Request body exceeds maximum allowed size.
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    /// Unexpected internal or storage error.
    pub const INTERNAL_ERROR: &str = "internal_error";
    /// Storage backend unreachable.
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
    /// Storage operation exceeded its deadline.
    pub const TIMEOUT: &str = "timeout";
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error (400).
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::VALIDATION_ERROR, message)
    }

    /// Creates a not found error (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(error_codes::NOT_FOUND, message)
    }

    /// Creates an already exists error (409).
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(error_codes::ALREADY_EXISTS, message)
    }

    /// Creates a payload too large error (413).
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(error_codes::PAYLOAD_TOO_LARGE, message)
    }

    /// Creates an internal error (500).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }

    /// Creates a service unavailable error (503).
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(error_codes::SERVICE_UNAVAILABLE, message)
    }

    /// Creates a timeout error (504).
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(error_codes::TIMEOUT, message)
    }

    /// HTTP status for this error's code.
    pub fn status(&self) -> StatusCode {
        use error_codes::*;

        match self.code.as_str() {
            VALIDATION_ERROR => StatusCode::BAD_REQUEST,
            NOT_FOUND => StatusCode::NOT_FOUND,
            ALREADY_EXISTS => StatusCode::CONFLICT,
            PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            TIMEOUT => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::InvalidInput { message } => ApiError::validation_error(message),
            // 503: connection errors, health check failures
            _ if err.is_unavailable() => {
                error!("Storage unavailable: {}", err);
                ApiError::service_unavailable("storage backend unavailable")
            }
            StorageError::RemoteError { status: 503, .. } => {
                error!("Remote store unavailable: {}", err);
                ApiError::service_unavailable("storage backend unavailable")
            }
            StorageError::QueryTimeout { .. } => {
                error!("Query timeout: {}", err);
                ApiError::gateway_timeout("storage operation timed out")
            }
            _ => {
                error!("Storage error: {}", err);
                ApiError::internal_error("internal storage error")
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        // Every domain error describes rejected caller input
        ApiError::validation_error(err.to_string())
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        ApiError::validation_error(err.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================
// Health and Readiness Checks
// ============================================================

/// Basic health check - returns 200 if the server is running.
///
/// This is a liveness probe. It does NOT check the store.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness check - runs the store's health check.
///
/// Returns 200 if ready, 503 if the store is unhealthy or unreachable.
/// Error details are logged but not exposed in the response.
async fn readiness_check<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let backend = state.store.backend_name();
    match state.store.health_check().await {
        Ok(status) if status.healthy => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "backend": backend,
                "checks": {
                    "storage": "ok"
                }
            })),
        ),
        Ok(status) => {
            warn!(
                backend,
                detail = status.message.as_deref().unwrap_or(""),
                "Readiness check failed: storage unhealthy"
            );
            not_ready(backend)
        }
        Err(e) => {
            error!(backend, "Readiness check failed: storage unavailable: {}", e);
            not_ready(backend)
        }
    }
}

fn not_ready(backend: &'static str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "status": "not_ready",
            "backend": backend,
            "checks": {
                "storage": "unavailable"
            }
        })),
    )
}

// ============================================================
// Single Product Operations
// ============================================================

/// Response body carrying the id of the affected product.
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: ProductId,
}

/// Takes the first `id` parameter of a single-item request.
fn single_id(params: IdParams) -> ApiResult<ProductId> {
    let value = params
        .0
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::validation_error("id must be provided"))?;
    Ok(ProductId::parse(value)?)
}

async fn create_product<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    JsonBadRequest(product): JsonBadRequest<Product>,
) -> ApiResult<impl IntoResponse> {
    validate_product(&product)?;

    match state.store.save(&product).await? {
        SaveOutcome::Created(id) => Ok((StatusCode::CREATED, Json(IdResponse { id }))),
        SaveOutcome::AlreadyExists(id) => Err(ApiError::already_exists(format!(
            "product {id} already exists"
        ))),
    }
}

async fn get_product<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    params: IdParams,
) -> ApiResult<Json<ProductRecord>> {
    let id = single_id(params)?;

    match state.store.get(&id).await? {
        Some(product) => Ok(Json(ProductRecord::with_id(id, product))),
        None => Err(ApiError::not_found(format!("product {id} not found"))),
    }
}

async fn update_product<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    JsonBadRequest(diff): JsonBadRequest<ProductDiff>,
) -> ApiResult<Json<IdResponse>> {
    validate_diff(&diff)?;

    if state.store.update(&diff).await? {
        Ok(Json(IdResponse { id: diff.id }))
    } else {
        Err(ApiError::not_found(format!("product {} not found", diff.id)))
    }
}

async fn delete_product<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    params: IdParams,
) -> ApiResult<Json<IdResponse>> {
    let id = single_id(params)?;

    if state.store.delete(&id).await? {
        Ok(Json(IdResponse { id }))
    } else {
        Err(ApiError::not_found(format!("product {id} not found")))
    }
}

// ============================================================
// Batch Product Operations
// ============================================================

/// Per-item entry of a batch response body.
#[derive(Debug, Serialize)]
pub struct BatchItemBody {
    pub index: usize,
    /// `success`, `conflict`, `not_found` or `internal_error`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The failure that decided the batch status.
#[derive(Debug, Serialize)]
pub struct BatchErrorBody {
    pub code: &'static str,
    pub message: String,
    pub index: usize,
}

/// Batch response body. `results` always covers every input item.
#[derive(Debug, Serialize)]
pub struct BatchResponseBody {
    pub results: Vec<BatchItemBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchErrorBody>,
}

fn failure_status(kind: FailureKind) -> (StatusCode, &'static str) {
    match kind {
        FailureKind::Conflict => (StatusCode::CONFLICT, error_codes::ALREADY_EXISTS),
        FailureKind::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
        FailureKind::InternalError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
        ),
    }
}

/// Renders a coordinator response.
///
/// The status is that of the first failure when any item failed and
/// `success` otherwise. `on_success` turns a success payload at the given
/// index into the `id` and `product` fields of its entry.
fn batch_reply<T>(
    response: BatchResponse<T>,
    success: StatusCode,
    on_success: impl Fn(usize, T) -> (Option<ProductId>, Option<Product>),
) -> (StatusCode, Json<BatchResponseBody>) {
    let results = response
        .results
        .into_iter()
        .map(|item| {
            let status = item.outcome.label();
            let (id, product, error) = match item.outcome {
                ItemOutcome::Success(value) => {
                    let (id, product) = on_success(item.index, value);
                    (id, product, None)
                }
                ItemOutcome::Conflict { id } => {
                    (Some(id), None, Some("product already exists".to_string()))
                }
                ItemOutcome::NotFound { id } => {
                    (Some(id), None, Some("product not found".to_string()))
                }
                // Details were logged by the coordinator
                ItemOutcome::InternalError { .. } => {
                    (None, None, Some("internal storage error".to_string()))
                }
            };
            BatchItemBody {
                index: item.index,
                status,
                id,
                product,
                error,
            }
        })
        .collect();

    let (status, error) = match response.first_failure {
        Some(BatchFailure { index, kind }) => {
            let (status, code) = failure_status(kind);
            (
                status,
                Some(BatchErrorBody {
                    code,
                    message: format!("item at index {index} failed: {}", kind.as_str()),
                    index,
                }),
            )
        }
        None => (success, None),
    };

    (status, Json(BatchResponseBody { results, error }))
}

/// Parses every `id` parameter of a batch request.
fn batch_ids(params: IdParams) -> ApiResult<Vec<ProductId>> {
    if params.0.is_empty() {
        return Err(ApiError::validation_error("element id must be provided"));
    }
    params
        .0
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            ProductId::parse(value).map_err(|e| {
                ApiError::validation_error(format!("invalid item at index {index}: {e}"))
            })
        })
        .collect()
}

async fn batch_create<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    JsonBadRequest(products): JsonBadRequest<Vec<Product>>,
) -> ApiResult<impl IntoResponse> {
    let response = state.coordinator.create(products).await?;
    Ok(batch_reply(response, StatusCode::CREATED, |_, created| {
        (Some(created.id), Some(created.product))
    }))
}

async fn batch_get<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    params: IdParams,
) -> ApiResult<impl IntoResponse> {
    let ids = batch_ids(params)?;
    let response = state.coordinator.get(ids.clone()).await?;
    Ok(batch_reply(response, StatusCode::OK, |index, product| {
        (ids.get(index).cloned(), Some(product))
    }))
}

async fn batch_update<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    JsonBadRequest(diffs): JsonBadRequest<Vec<ProductDiff>>,
) -> ApiResult<impl IntoResponse> {
    let response = state.coordinator.update(diffs).await?;
    Ok(batch_reply(response, StatusCode::OK, |_, id| (Some(id), None)))
}

async fn batch_delete<S: ProductStore>(
    State(state): State<Arc<AppState<S>>>,
    params: IdParams,
) -> ApiResult<impl IntoResponse> {
    let ids = batch_ids(params)?;
    let response = state.coordinator.delete(ids).await?;
    Ok(batch_reply(response, StatusCode::OK, |_, id| (Some(id), None)))
}
