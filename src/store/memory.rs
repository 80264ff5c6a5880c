//! In-memory [`VectorStore`] implementation for tests.
//!
//! Passages live in a `HashMap` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over all stored vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{PassageRecord, SearchHit};

use super::VectorStore;

/// In-memory store for tests and ephemeral sessions.
pub struct InMemoryStore {
    passages: RwLock<HashMap<String, PassageRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            passages: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, record: &PassageRecord) -> Result<()> {
        let mut passages = self.passages.write().unwrap();
        passages.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let passages = self.passages.read().unwrap();
        let mut hits: Vec<SearchHit> = passages
            .values()
            .filter(|r| r.embedding.len() == query_vec.len())
            .map(|r| SearchHit {
                id: r.id.clone(),
                source: r.source.clone(),
                chunk_index: r.chunk_index,
                text: r.text.clone(),
                score: cosine_similarity(query_vec, &r.embedding) as f64,
            })
            .collect();
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
        self.passages.write().unwrap().clear();
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.passages.read().unwrap().len() as i64)
    }
}
