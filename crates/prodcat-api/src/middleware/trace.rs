//! Request tracing middleware.
//!
//! One layer assigns the `x-request-id`, names the catalog operation the
//! request targets, and runs the handler inside an `http_request` span. Logs
//! emitted by the coordinator and the stores while serving the request carry
//! the same request id and operation.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use axum::http::{HeaderValue, Method, Request, Response};
use tower::{Layer, Service};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// HTTP header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request id that is kept.
pub const MAX_REQUEST_ID_LEN: usize = 128;

const SINGLE_PATH: &str = "/store/product/single";
const BATCH_PATH: &str = "/store/product/batch";

/// The catalog operation a request targets, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOperation {
    Create { batch: bool },
    Get { batch: bool },
    Update { batch: bool },
    Delete { batch: bool },
    Health,
    Ready,
    Metrics,
    Other,
}

impl CatalogOperation {
    /// Classifies a request by method and path.
    pub fn classify(method: &Method, path: &str) -> Self {
        let batch = match path {
            SINGLE_PATH => false,
            BATCH_PATH => true,
            "/health" => return Self::Health,
            "/ready" => return Self::Ready,
            "/metrics" => return Self::Metrics,
            _ => return Self::Other,
        };

        match *method {
            Method::POST => Self::Create { batch },
            Method::GET => Self::Get { batch },
            Method::PATCH => Self::Update { batch },
            Method::DELETE => Self::Delete { batch },
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create { batch: false } => "create",
            Self::Create { batch: true } => "batch_create",
            Self::Get { batch: false } => "get",
            Self::Get { batch: true } => "batch_get",
            Self::Update { batch: false } => "update",
            Self::Update { batch: true } => "batch_update",
            Self::Delete { batch: false } => "delete",
            Self::Delete { batch: true } => "batch_delete",
            Self::Health => "health",
            Self::Ready => "ready",
            Self::Metrics => "metrics",
            Self::Other => "other",
        }
    }
}

/// Keeps an incoming id only if it is short printable ASCII without spaces.
fn accept_request_id(value: &HeaderValue) -> Option<String> {
    let id = value.to_str().ok()?;
    let valid = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic());
    valid.then(|| id.to_string())
}

/// Layer that tags each request with an id and traces it.
///
/// An acceptable incoming `x-request-id` is kept; otherwise a UUID v4 is
/// generated. The id is written to the request (for handlers) and to the
/// response.
#[derive(Clone, Default)]
pub struct RequestTraceLayer;

impl RequestTraceLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestTraceLayer {
    type Service = RequestTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTraceService { inner }
    }
}

#[derive(Clone)]
pub struct RequestTraceService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestTraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(accept_request_id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        // Both sources are visible ASCII, so this conversion does not fail.
        let header = HeaderValue::from_str(&request_id).ok();
        if let Some(value) = header.clone() {
            request.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let operation = CatalogOperation::classify(&method, &path);

        let span = info_span!(
            target: "prodcat::http",
            "http_request",
            request_id = %request_id,
            operation = operation.as_str(),
        );

        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                info!(target: "prodcat::http", method = %method, path = %path, "request started");

                let mut response = inner.call(request).await?;
                let status = response.status().as_u16();
                let duration_ms = start.elapsed().as_millis() as u64;

                if response.status().is_server_error() {
                    warn!(target: "prodcat::http", status, duration_ms, "request failed");
                } else {
                    info!(target: "prodcat::http", status, duration_ms, "request completed");
                }

                if let Some(value) = header {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
