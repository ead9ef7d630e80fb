//! PostgreSQL storage implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use prodcat_domain::{Product, ProductDiff, ProductId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, instrument};

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::query::execute_with_timeout_and_metrics;
use crate::traits::{ProductStore, SaveOutcome};

/// Default health check timeout in seconds.
/// Shorter than the query timeout since readiness probes should be fast.
const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Default query timeout in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const BACKEND: &str = "postgres";

/// PostgreSQL configuration options.
#[derive(Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    pub min_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum time to wait for a query to complete. A query exceeding this
    /// duration is abandoned and returns `StorageError::QueryTimeout`.
    pub query_timeout_secs: u64,
    /// Timeout for health checks in seconds.
    pub health_check_timeout_secs: u64,
}

// Custom Debug implementation to hide credentials in database_url
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("health_check_timeout_secs", &self.health_check_timeout_secs)
            .finish()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/prodcat".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            health_check_timeout_secs: DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
        }
    }
}

/// PostgreSQL implementation of ProductStore.
///
/// Row-level atomicity comes from the database: `save` is a single
/// `INSERT .. ON CONFLICT DO NOTHING` and `update` a single `UPDATE`, so
/// concurrent patches never interleave inside one record.
pub struct PostgresProductStore {
    pool: PgPool,
    query_timeout: Duration,
    health_check_timeout: Duration,
}

impl PostgresProductStore {
    /// Creates a store from an existing connection pool with default timeouts.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            health_check_timeout: Duration::from_secs(DEFAULT_HEALTH_CHECK_TIMEOUT_SECS),
        }
    }

    /// Creates a store with the given configuration.
    #[instrument(skip(config))]
    pub async fn from_config(config: &PostgresConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| StorageError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            health_check_timeout: Duration::from_secs(config.health_check_timeout_secs),
        })
    }

    /// Creates a store from a database URL with default settings.
    pub async fn from_url(database_url: &str) -> StorageResult<Self> {
        let config = PostgresConfig {
            database_url: database_url.to_string(),
            ..Default::default()
        };
        Self::from_config(&config).await
    }

    /// Runs database migrations to create required tables.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> StorageResult<()> {
        debug!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
                stock BIGINT NOT NULL CHECK (stock >= 0),
                tags TEXT[] NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to create products table: {e}"),
        })?;

        debug!("Database migrations completed");
        Ok(())
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_with_timeout<T, F>(
        &self,
        operation: &'static str,
        future: F,
    ) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        execute_with_timeout_and_metrics(BACKEND, operation, self.query_timeout, future).await
    }
}

/// Maps a sqlx error, separating connectivity failures from query failures.
fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::ConnectionError {
                message: format!("{operation}: {e}"),
            }
        }
        other => StorageError::QueryError {
            message: format!("Failed to {operation}: {other}"),
        },
    }
}

fn stock_to_db(stock: u64) -> StorageResult<i64> {
    i64::try_from(stock).map_err(|_| StorageError::InvalidInput {
        message: format!("stock {stock} exceeds BIGINT range"),
    })
}

fn row_to_product(row: &PgRow) -> StorageResult<Product> {
    let decode = |e: sqlx::Error| StorageError::SerializationError {
        message: format!("Failed to decode product row: {e}"),
    };
    let stock: i64 = row.try_get("stock").map_err(decode)?;
    Ok(Product {
        name: row.try_get("name").map_err(decode)?,
        manufacturer: row.try_get("manufacturer").map_err(decode)?,
        price: row.try_get("price").map_err(decode)?,
        stock: u64::try_from(stock).map_err(|_| StorageError::SerializationError {
            message: format!("negative stock {stock} in products table"),
        })?,
        tags: row.try_get("tags").map_err(decode)?,
    })
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self, product))]
    async fn save(&self, product: &Product) -> StorageResult<SaveOutcome> {
        let id = product.id();
        let stock = stock_to_db(product.stock)?;

        let result = self
            .execute_with_timeout("save", async {
                sqlx::query(
                    r#"
                    INSERT INTO products (id, name, manufacturer, price, stock, tags)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(id.as_str())
                .bind(&product.name)
                .bind(&product.manufacturer)
                .bind(product.price)
                .bind(stock)
                .bind(&product.tags)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("save product", e))
            })
            .await?;

        if result.rows_affected() == 0 {
            Ok(SaveOutcome::AlreadyExists(id))
        } else {
            Ok(SaveOutcome::Created(id))
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        let row = self
            .execute_with_timeout("get", async {
                sqlx::query(
                    r#"
                    SELECT name, manufacturer, price, stock, tags
                    FROM products
                    WHERE id = $1
                    "#,
                )
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get product", e))
            })
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    #[instrument(skip(self, diff), fields(id = %diff.id))]
    async fn update(&self, diff: &ProductDiff) -> StorageResult<bool> {
        let stock = diff.diff.stock.map(stock_to_db).transpose()?;

        let result = self
            .execute_with_timeout("update", async {
                sqlx::query(
                    r#"
                    UPDATE products
                    SET price = COALESCE($2, price),
                        stock = COALESCE($3, stock),
                        tags = COALESCE($4, tags)
                    WHERE id = $1
                    "#,
                )
                .bind(diff.id.as_str())
                .bind(diff.diff.price)
                .bind(stock)
                .bind(diff.diff.tags.clone())
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("update product", e))
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &ProductId) -> StorageResult<bool> {
        let result = self
            .execute_with_timeout("delete", async {
                sqlx::query("DELETE FROM products WHERE id = $1")
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("delete product", e))
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();

        let check_result = tokio::time::timeout(self.health_check_timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::HealthCheckFailed {
                    message: format!("database ping failed: {e}"),
                })
        })
        .await;

        let latency = start.elapsed();

        let status = match &check_result {
            Ok(Ok(_)) => "success",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        metrics::histogram!(
            "prodcat_storage_health_check_duration_seconds",
            "backend" => BACKEND,
            "status" => status
        )
        .record(latency.as_secs_f64());

        match check_result {
            Ok(result) => {
                result?;
            }
            Err(_elapsed) => {
                return Err(StorageError::QueryTimeout {
                    operation: "health_check".to_string(),
                    timeout: self.health_check_timeout,
                });
            }
        }

        metrics::gauge!(
            "prodcat_storage_pool_connections",
            "backend" => BACKEND,
            "state" => "idle"
        )
        .set(self.pool.num_idle() as f64);

        Ok(HealthStatus {
            healthy: true,
            latency,
            message: Some("postgresql".to_string()),
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

impl std::fmt::Debug for PostgresProductStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresProductStore")
            .field("pool", &"PgPool")
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_url() {
        let config = PostgresConfig {
            database_url: "postgres://user:secret@db/prodcat".to_string(),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_stock_beyond_bigint_is_invalid_input() {
        assert_eq!(stock_to_db(7).unwrap(), 7);
        assert!(matches!(
            stock_to_db(u64::MAX),
            Err(StorageError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_pool_errors_map_to_connection_error() {
        assert!(map_sqlx_error("get product", sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(matches!(
            map_sqlx_error("get product", sqlx::Error::RowNotFound),
            StorageError::QueryError { .. }
        ));
    }
}
