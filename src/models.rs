//! Core data models used throughout medrag.
//!
//! These types represent the passages, search hits, and reports that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

/// An embedded passage as stored in the index.
#[derive(Debug, Clone)]
pub struct PassageRecord {
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub model: String,
    pub dims: usize,
}

/// A raw nearest-neighbor hit returned by a vector store.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}

/// A passage returned to callers of the retrieval layer.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: i64,
    pub score: f64,
}

impl From<SearchHit> for RetrievedPassage {
    fn from(hit: SearchHit) -> Self {
        RetrievedPassage {
            id: hit.id,
            text: hit.text,
            source: hit.source,
            chunk_index: hit.chunk_index,
            score: hit.score,
        }
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub documents: u64,
    pub passages: u64,
    pub skipped: u64,
}
