//! Shared test utilities for prodcat API tests.

// Each test file uses a different subset of these helpers.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use prodcat_api::http::{create_router, AppState};
use prodcat_domain::Product;
use prodcat_storage::{MemoryProductStore, ProductStore};

/// Create a test app over the given store.
///
/// Each call builds a fresh router around the shared store, which is the
/// pattern Axum's `oneshot` testing needs.
pub fn create_test_app<S: ProductStore>(store: &Arc<S>) -> axum::Router {
    create_router(AppState::new(Arc::clone(store)))
}

/// Sends one request and returns the status and parsed JSON body
/// (`Value::Null` for an empty body).
pub async fn send_json(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 4 * 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// `n` distinct products named `{prefix}-{i}`.
pub fn products(prefix: &str, n: usize) -> Vec<Product> {
    (0..n)
        .map(|i| {
            Product::new(
                format!("{prefix}-{i}"),
                "Acme",
                i as f64 + 0.5,
                i as u64,
                vec![prefix.to_string()],
            )
        })
        .collect()
}

/// Serves an in-memory catalog on an ephemeral local port.
///
/// Returns the store backing the server and its base URL. The server task
/// runs until the test runtime shuts down.
pub async fn spawn_store_service() -> (Arc<MemoryProductStore>, String) {
    let store = MemoryProductStore::new_shared();
    let app = create_test_app(&store);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (store, format!("http://{addr}"))
}
