//! Storage abstraction for medrag.
//!
//! The [`VectorStore`] trait defines the operations the retrieval pipeline
//! needs from a passage store, enabling pluggable backends (SQLite for the
//! CLI and server, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{PassageRecord, SearchHit};

/// Abstract passage store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace a passage by ID |
/// | [`search`](VectorStore::search) | Cosine similarity search, best first |
/// | [`clear`](VectorStore::clear) | Reset to an empty, usable store |
/// | [`count`](VectorStore::count) | Number of stored passages |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a passage by ID. Re-ingesting the same ID
    /// overwrites the previous row instead of duplicating it.
    async fn upsert(&self, record: &PassageRecord) -> Result<()>;

    /// Return up to `k` passages nearest to `query_vec`, best first.
    /// Ties are broken by ID so result order is stable. Stored vectors
    /// with a different dimensionality are skipped.
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Drop every stored passage, leaving an empty store that accepts
    /// new writes immediately.
    async fn clear(&self) -> Result<()>;

    /// Number of stored passages.
    async fn count(&self) -> Result<i64>;
}
