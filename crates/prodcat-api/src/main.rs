//! prodcat server binary
//!
//! Product catalog service with single and batch CRUD endpoints.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! prodcat --config config.yaml
//!
//! # With environment variables only
//! PRODCAT_STORAGE__BACKEND=memory prodcat
//! ```
//!
//! The same binary serves as the store service that a `remote` backend
//! points at.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use prodcat_api::http::{
    create_router_with_body_limit, create_router_with_observability_and_limit, AppState,
};
use prodcat_api::middleware::{MetricsLayer, RequestMetrics, RequestTraceLayer};
use prodcat_api::observability::{init_logging, init_metrics, parse_log_level, LoggingConfig};
use prodcat_server::ServerConfig;
use prodcat_storage::{
    MemoryProductStore, PostgresProductStore, ProductStore, RemoteProductStore,
};

/// prodcat - Product Catalog Service
#[derive(Parser, Debug)]
#[command(name = "prodcat")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = if let Some(config_path) = args.config {
        ServerConfig::load(&config_path)?
    } else {
        ServerConfig::from_env()?
    };

    init_logging(logging_config(&config));

    info!(version = env!("CARGO_PKG_VERSION"), "Starting prodcat server");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    match config.storage.backend.as_str() {
        "memory" => {
            info!("Using in-memory storage backend");
            run_server(MemoryProductStore::new_shared(), addr, &config).await
        }
        "postgres" => {
            let pg_config = config.storage.postgres_config().ok_or_else(|| {
                anyhow::anyhow!("storage.database_url is required for postgres backend")
            })?;

            info!("Connecting to PostgreSQL database");
            let store = PostgresProductStore::from_config(&pg_config).await?;
            info!("PostgreSQL connection established");

            info!("Running database migrations");
            store.run_migrations().await?;
            info!("Database migrations complete");

            run_server(Arc::new(store), addr, &config).await
        }
        "remote" => {
            let remote_config = config.storage.remote_config().ok_or_else(|| {
                anyhow::anyhow!("storage.remote_url is required for remote backend")
            })?;

            info!(url = %remote_config.base_url, "Using remote storage backend");
            let store = RemoteProductStore::from_config(&remote_config)?;
            run_server(Arc::new(store), addr, &config).await
        }
        other => {
            error!("Unknown storage backend: {}", other);
            anyhow::bail!("Unknown storage backend: {}", other);
        }
    }
}

fn logging_config(config: &ServerConfig) -> LoggingConfig {
    let logging = if config.logging.json {
        LoggingConfig::json()
    } else {
        LoggingConfig::text()
    }
    .with_level(parse_log_level(&config.logging.level));

    if config.logging.spans {
        logging.with_spans()
    } else {
        logging
    }
}

/// Builds the router for `store` and serves it until shutdown.
async fn run_server<S: ProductStore>(
    store: Arc<S>,
    addr: SocketAddr,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let state = AppState::with_max_batch_size(store, config.batch.max_batch_size);
    let body_limit = config.server.body_limit_bytes;

    let router = if config.metrics.enabled {
        let metrics_state = init_metrics()?;
        info!("Metrics enabled at /metrics");
        create_router_with_observability_and_limit(state, metrics_state, body_limit)
    } else {
        create_router_with_body_limit(state, body_limit)
    };

    // Last layer added runs first
    let router = router
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(MetricsLayer::new(Arc::new(RequestMetrics::new())))
        .layer(RequestTraceLayer::new());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
