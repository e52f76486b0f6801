//! Database module for PostgreSQL connectivity and schema introspection.

pub mod schema;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub use schema::{fetch_schema, SchemaDescriptor};

/// Build the connection pool. Callers hold the pool and check out a
/// connection per request; nothing database-related lives in globals.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}
