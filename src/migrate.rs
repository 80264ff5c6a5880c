use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Passage table DDL, shared with `SqliteStore::clear` so a reset rebuilds
/// exactly what a migration creates.
pub(crate) const CREATE_PASSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS passages (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    model TEXT NOT NULL,
    dims INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

pub(crate) const CREATE_PASSAGES_SOURCE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_passages_source ON passages(source)";

pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_PASSAGES_TABLE).execute(pool).await?;
    sqlx::query(CREATE_PASSAGES_SOURCE_INDEX)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}
