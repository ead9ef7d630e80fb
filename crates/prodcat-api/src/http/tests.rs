//! HTTP API tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

use prodcat_domain::{Product, ProductDiff, ProductId};
use prodcat_storage::{
    HealthStatus, MemoryProductStore, ProductStore, SaveOutcome, StorageError, StorageResult,
};

use super::routes::{create_router, create_router_with_body_limit, create_router_with_observability};
use super::state::AppState;

fn test_app(store: &Arc<MemoryProductStore>) -> axum::Router {
    create_router(AppState::new(Arc::clone(store)))
}

fn widget() -> Product {
    Product::new("Widget", "Acme", 9.99, 10, vec!["tools".to_string()])
}

async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
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
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// ============================================================
// Health and readiness
// ============================================================

#[tokio::test]
async fn test_health_returns_ok() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(test_app(&store), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_reports_storage_ok() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(test_app(&store), "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["checks"]["storage"], "ok");
}

#[tokio::test]
async fn test_ready_returns_503_when_store_unreachable() {
    let app = create_router(AppState::new(Arc::new(FailingStore::unavailable())));
    let (status, body) = send(app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["checks"]["storage"], "unavailable");
}

#[tokio::test]
async fn test_observability_router_serves_metrics_and_products() {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let store = MemoryProductStore::new_shared();
    let metrics_state = crate::observability::MetricsState::new(
        PrometheusBuilder::new().build_recorder().handle(),
    );
    let app = create_router_with_observability(AppState::new(Arc::clone(&store)), metrics_state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));

    let (status, _) = send(app.clone(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app,
        "POST",
        "/store/product/single",
        Some(serde_json::to_value(widget()).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

// ============================================================
// Single product operations
// ============================================================

#[tokio::test]
async fn test_create_returns_201_with_content_id() {
    let store = MemoryProductStore::new_shared();
    let product = widget();

    let (status, body) = send(
        test_app(&store),
        "POST",
        "/store/product/single",
        Some(serde_json::to_value(&product).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], product.id().as_str());
    assert_eq!(store.get(&product.id()).await.unwrap(), Some(product));
}

#[tokio::test]
async fn test_create_duplicate_returns_409() {
    let store = MemoryProductStore::new_shared();
    let product = widget();
    store.save(&product).await.unwrap();

    let (status, body) = send(
        test_app(&store),
        "POST",
        "/store/product/single",
        Some(serde_json::to_value(&product).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_exists");
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_create_malformed_json_returns_400_not_422() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(
        test_app(&store),
        "POST",
        "/store/product/single",
        Some(json!({ "name": "Widget", "price": "cheap" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_create_invalid_product_returns_400() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(
        test_app(&store),
        "POST",
        "/store/product/single",
        Some(json!({ "name": "", "manufacturer": "Acme", "price": 1.0, "stock": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_oversized_body_returns_413() {
    let store = MemoryProductStore::new_shared();
    let app = create_router_with_body_limit(AppState::new(Arc::clone(&store)), 64);
    let product = Product::new("x".repeat(200), "Acme", 1.0, 1, vec![]);

    let (status, _) = send(
        app,
        "POST",
        "/store/product/single",
        Some(serde_json::to_value(&product).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_get_returns_record_with_id() {
    let store = MemoryProductStore::new_shared();
    let product = widget();
    let id = store.save(&product).await.unwrap().id().clone();

    let (status, body) = send(
        test_app(&store),
        "GET",
        &format!("/store/product/single?id={id}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["name"], "Widget");
    assert_eq!(body["manufacturer"], "Acme");
    assert_eq!(body["stock"], 10);
    assert_eq!(body["tags"], json!(["tools"]));
}

#[tokio::test]
async fn test_get_unknown_returns_404() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(
        test_app(&store),
        "GET",
        "/store/product/single?id=does-not-exist",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_missing_id_returns_400() {
    let store = MemoryProductStore::new_shared();

    for method in ["GET", "DELETE"] {
        let (status, body) = send(test_app(&store), method, "/store/product/single", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
        assert_eq!(body["message"], "id must be provided", "{method}");
    }
}

#[tokio::test]
async fn test_update_changes_only_diff_fields() {
    let store = MemoryProductStore::new_shared();
    let product = widget();
    let id = store.save(&product).await.unwrap().id().clone();

    let (status, body) = send(
        test_app(&store),
        "PATCH",
        "/store/product/single",
        Some(json!({ "id": id.as_str(), "diff": { "stock": 3 } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let stored = store.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 3);
    assert_eq!(stored.price, product.price);
    assert_eq!(stored.name, product.name);
    assert_eq!(stored.tags, product.tags);
}

#[tokio::test]
async fn test_update_accepts_capitalized_fields() {
    let store = MemoryProductStore::new_shared();
    let id = store.save(&widget()).await.unwrap().id().clone();

    let (status, _) = send(
        test_app(&store),
        "PATCH",
        "/store/product/single",
        Some(json!({ "ID": id.as_str(), "Diff": { "price": 5.0 } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.get(&id).await.unwrap().unwrap().price, 5.0);
}

#[tokio::test]
async fn test_update_unknown_returns_404_and_creates_nothing() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(
        test_app(&store),
        "PATCH",
        "/store/product/single",
        Some(json!({ "id": "ghost", "diff": { "stock": 1 } })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_update_empty_diff_returns_400() {
    let store = MemoryProductStore::new_shared();
    let id = store.save(&widget()).await.unwrap().id().clone();

    let (status, _) = send(
        test_app(&store),
        "PATCH",
        "/store/product/single",
        Some(json!({ "id": id.as_str(), "diff": {} })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_then_get_returns_404() {
    let store = MemoryProductStore::new_shared();
    let id = store.save(&widget()).await.unwrap().id().clone();
    let uri = format!("/store/product/single?id={id}");

    let (status, body) = send(test_app(&store), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, _) = send(test_app(&store), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(test_app(&store), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================
// Batch product operations
// ============================================================

#[tokio::test]
async fn test_batch_create_all_new_returns_201_in_input_order() {
    let store = MemoryProductStore::new_shared();
    let products: Vec<Product> = (0..5)
        .map(|i| Product::new(format!("Item {i}"), "Acme", i as f64, i, vec![]))
        .collect();

    let (status, body) = send(
        test_app(&store),
        "POST",
        "/store/product/batch",
        Some(serde_json::to_value(&products).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("error").is_none());
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for (i, (result, product)) in results.iter().zip(&products).enumerate() {
        assert_eq!(result["index"], i);
        assert_eq!(result["status"], "success");
        assert_eq!(result["id"], product.id().as_str());
        assert_eq!(result["product"]["name"], product.name.as_str());
    }
    assert_eq!(store.len().await, 5);
}

#[tokio::test]
async fn test_batch_create_with_existing_returns_409_and_keeps_new_items() {
    let store = MemoryProductStore::new_shared();
    let existing = widget();
    store.save(&existing).await.unwrap();
    let fresh = Product::new("Gadget", "Acme", 1.0, 1, vec![]);

    let (status, body) = send(
        test_app(&store),
        "POST",
        "/store/product/batch",
        Some(json!([fresh, existing])),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "already_exists");
    assert_eq!(body["error"]["index"], 1);
    assert_eq!(body["results"][0]["status"], "success");
    assert_eq!(body["results"][1]["status"], "conflict");
    assert_eq!(store.get(&fresh.id()).await.unwrap(), Some(fresh));
}

#[tokio::test]
async fn test_batch_empty_body_returns_400() {
    let store = MemoryProductStore::new_shared();
    let (status, body) = send(test_app(&store), "POST", "/store/product/batch", Some(json!([]))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_batch_too_large_returns_400_without_dispatch() {
    let store = MemoryProductStore::new_shared();
    let app = create_router(AppState::with_max_batch_size(Arc::clone(&store), 2));
    let products: Vec<Product> = (0..3)
        .map(|i| Product::new(format!("Item {i}"), "Acme", 1.0, i, vec![]))
        .collect();

    let (status, _) = send(
        app,
        "POST",
        "/store/product/batch",
        Some(serde_json::to_value(&products).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_batch_get_with_repeated_ids() {
    let store = MemoryProductStore::new_shared();
    let a = store.save(&widget()).await.unwrap().id().clone();
    let b = store
        .save(&Product::new("Gadget", "Acme", 2.0, 2, vec![]))
        .await
        .unwrap()
        .id()
        .clone();

    let (status, body) = send(
        test_app(&store),
        "GET",
        &format!("/store/product/batch?id={b}&id={a}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["id"], b.as_str());
    assert_eq!(body["results"][0]["product"]["name"], "Gadget");
    assert_eq!(body["results"][1]["id"], a.as_str());
    assert_eq!(body["results"][1]["product"]["name"], "Widget");
}

#[tokio::test]
async fn test_batch_get_with_unknown_id_returns_404_and_found_items() {
    let store = MemoryProductStore::new_shared();
    let a = store.save(&widget()).await.unwrap().id().clone();

    let (status, body) = send(
        test_app(&store),
        "GET",
        &format!("/store/product/batch?id={a}&id=ghost"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["index"], 1);
    assert_eq!(body["results"][0]["status"], "success");
    assert_eq!(body["results"][0]["product"]["name"], "Widget");
    assert_eq!(body["results"][1]["status"], "not_found");
    assert_eq!(body["results"][1]["id"], "ghost");
}

#[tokio::test]
async fn test_batch_without_ids_returns_400() {
    let store = MemoryProductStore::new_shared();

    for method in ["GET", "DELETE"] {
        let (status, body) = send(test_app(&store), method, "/store/product/batch", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
        assert_eq!(body["message"], "element id must be provided", "{method}");
    }
}

#[tokio::test]
async fn test_batch_update_and_delete() {
    let store = MemoryProductStore::new_shared();
    let a = store.save(&widget()).await.unwrap().id().clone();
    let b = store
        .save(&Product::new("Gadget", "Acme", 2.0, 2, vec![]))
        .await
        .unwrap()
        .id()
        .clone();

    let (status, body) = send(
        test_app(&store),
        "PATCH",
        "/store/product/batch",
        Some(json!([
            { "id": a.as_str(), "diff": { "price": 1.5 } },
            { "id": b.as_str(), "diff": { "tags": ["sale"] } }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][1]["id"], b.as_str());
    assert_eq!(store.get(&a).await.unwrap().unwrap().price, 1.5);
    assert_eq!(store.get(&b).await.unwrap().unwrap().tags, vec!["sale"]);

    let (status, _) = send(
        test_app(&store),
        "DELETE",
        &format!("/store/product/batch?id={a}&id={b}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_batch_update_unknown_id_returns_404_and_applies_others() {
    let store = MemoryProductStore::new_shared();
    let a = store.save(&widget()).await.unwrap().id().clone();

    let (status, body) = send(
        test_app(&store),
        "PATCH",
        "/store/product/batch",
        Some(json!([
            { "id": "ghost", "diff": { "stock": 1 } },
            { "id": a.as_str(), "diff": { "stock": 99 } }
        ])),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["index"], 0);
    assert_eq!(store.get(&a).await.unwrap().unwrap().stock, 99);
    assert_eq!(store.len().await, 1);
}

// ============================================================
// Storage error mapping
// ============================================================

/// Store whose every operation fails with a fixed error.
struct FailingStore {
    error: fn() -> StorageError,
}

impl FailingStore {
    fn unavailable() -> Self {
        Self {
            error: || StorageError::ConnectionError {
                message: "connection refused".to_string(),
            },
        }
    }

    fn timing_out() -> Self {
        Self {
            error: || StorageError::QueryTimeout {
                operation: "get".to_string(),
                timeout: Duration::from_secs(1),
            },
        }
    }

    fn broken() -> Self {
        Self {
            error: || StorageError::QueryError {
                message: "relation \"products\" does not exist".to_string(),
            },
        }
    }
}

#[async_trait]
impl ProductStore for FailingStore {
    async fn save(&self, _product: &Product) -> StorageResult<SaveOutcome> {
        Err((self.error)())
    }

    async fn get(&self, _id: &ProductId) -> StorageResult<Option<Product>> {
        Err((self.error)())
    }

    async fn update(&self, _diff: &ProductDiff) -> StorageResult<bool> {
        Err((self.error)())
    }

    async fn delete(&self, _id: &ProductId) -> StorageResult<bool> {
        Err((self.error)())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Err((self.error)())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_storage_errors_map_to_status_codes() {
    let cases = [
        (FailingStore::unavailable(), StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
        (FailingStore::timing_out(), StatusCode::GATEWAY_TIMEOUT, "timeout"),
        (FailingStore::broken(), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    ];

    for (store, expected_status, expected_code) in cases {
        let app = create_router(AppState::new(Arc::new(store)));
        let (status, body) = send(app, "GET", "/store/product/single?id=abc", None).await;

        assert_eq!(status, expected_status);
        assert_eq!(body["code"], expected_code);
        // Backend details stay in the logs
        assert!(!body["message"].as_str().unwrap().contains("products"));
    }
}

#[tokio::test]
async fn test_batch_storage_failure_returns_500_with_per_item_results() {
    let app = create_router(AppState::new(Arc::new(FailingStore::broken())));

    let (status, body) = send(app, "GET", "/store/product/batch?id=a&id=b", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "internal_error");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["status"] == "internal_error"));
}
