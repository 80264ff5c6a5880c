//! SQLite-backed [`VectorStore`] implementation.
//!
//! Passages live in a single `passages` table with embeddings stored as
//! little-endian f32 BLOBs. Search loads every row and ranks by cosine
//! similarity in process; corpora here are small enough that a full scan
//! is fine without an ANN index.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::{PassageRecord, SearchHit};

use super::VectorStore;

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, record: &PassageRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let blob = vec_to_blob(&record.embedding);

        sqlx::query(
            r#"
            INSERT INTO passages (id, source, chunk_index, text, embedding,
                                  model, dims, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source = excluded.source,
                chunk_index = excluded.chunk_index,
                text = excluded.text,
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.source)
        .bind(record.chunk_index)
        .bind(&record.text)
        .bind(&blob)
        .bind(&record.model)
        .bind(record.dims as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query("SELECT id, source, chunk_index, text, embedding FROM passages")
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            if vector.len() != query_vec.len() {
                continue;
            }
            hits.push(SearchHit {
                id: row.get("id"),
                source: row.get("source"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                score: cosine_similarity(query_vec, &vector) as f64,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn clear(&self) -> Result<()> {
        // Drop and recreate rather than DELETE: a reset must leave a fresh
        // table even when the old one is damaged.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DROP TABLE IF EXISTS passages")
            .execute(&mut *tx)
            .await?;
        sqlx::query(migrate::CREATE_PASSAGES_TABLE)
            .execute(&mut *tx)
            .await?;
        sqlx::query(migrate::CREATE_PASSAGES_SOURCE_INDEX)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
