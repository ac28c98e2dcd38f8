//! PostgreSQL provisioning and pool construction.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::info;
use url::Url;

/// Maximum time to wait for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Database used for the existence check and `CREATE DATABASE`.
const MAINTENANCE_DATABASE: &str = "postgres";

/// Errors that can occur during database setup.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),
}

/// Result type for database setup.
pub type Result<T> = std::result::Result<T, DbError>;

/// Split a connection URL into (maintenance URL, application database name).
fn maintenance_target(database_url: &str) -> Result<(String, String)> {
    let mut url = Url::parse(database_url).map_err(|e| DbError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(DbError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    let name = url.path().trim_start_matches('/').to_string();
    if name.is_empty() {
        return Err(DbError::InvalidUrl("database name missing".into()));
    }
    url.set_path(&format!("/{MAINTENANCE_DATABASE}"));
    Ok((url.to_string(), name))
}

/// Create the application database named in `database_url` if it is missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<()> {
    let (maintenance_url, name) = maintenance_target(database_url)?;
    let pool = PgPool::connect(&maintenance_url).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&name)
            .fetch_one(&pool)
            .await?;

    if !exists {
        info!(database = %name, "creating database");
        // CREATE DATABASE cannot use bind parameters
        let sql = format!("CREATE DATABASE \"{}\"", name.replace('"', "\"\""));
        sqlx::query(&sql).execute(&pool).await?;
    }

    pool.close().await;
    Ok(())
}

/// Open the application pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}
