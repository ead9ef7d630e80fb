//! HTTP REST API endpoints.
//!
//! # Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/store/product/single` | POST | Create one product |
//! | `/store/product/single?id=` | GET | Fetch one product |
//! | `/store/product/single` | PATCH | Apply one diff |
//! | `/store/product/single?id=` | DELETE | Delete one product |
//! | `/store/product/batch` | POST | Create many products |
//! | `/store/product/batch?id=a&id=b` | GET | Fetch many products |
//! | `/store/product/batch` | PATCH | Apply many diffs |
//! | `/store/product/batch?id=a&id=b` | DELETE | Delete many products |
//! | `/health` | GET | Liveness |
//! | `/ready` | GET | Store health check |
//! | `/metrics` | GET | Prometheus metrics |

pub mod routes;
pub mod state;

pub use routes::{
    create_router, create_router_with_body_limit, create_router_with_observability,
    create_router_with_observability_and_limit, ApiError, DEFAULT_BODY_LIMIT,
};
pub use state::AppState;

#[cfg(test)]
mod tests;
