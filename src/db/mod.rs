use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Creates the history tables if they do not exist. The feed registry is
/// normally managed by the admin surface; running the DDL here keeps a fresh
/// database usable without it.
pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    for statement in queries::SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
