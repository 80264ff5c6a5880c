//! The passage index: one object tying store, embedder, and configuration.
//!
//! Every ingestion and retrieval path goes through an [`Index`], so the
//! whole process embeds with a single pinned model configuration. Queries
//! degrade to an empty result on failure; writes and resets surface their
//! errors to the caller.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::migrate;
use crate::models::{PassageRecord, RetrievedPassage, SearchHit};
use crate::store::{SqliteStore, VectorStore};

pub struct Index {
    store: Arc<dyn VectorStore>,
    provider: Box<dyn EmbeddingProvider>,
    embedding: EmbeddingConfig,
}

impl Index {
    /// Build an index over an explicit store and provider.
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Box<dyn EmbeddingProvider>,
        embedding: EmbeddingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            embedding,
        }
    }

    /// Open the SQLite-backed index described by the config, creating the
    /// schema if it does not exist yet.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        let provider = embedding::create_provider(&config.embedding)?;
        Ok(Self {
            store: Arc::new(SqliteStore::new(pool)),
            provider,
            embedding: config.embedding.clone(),
        })
    }

    /// Add one passage. When `vector` is `None` the index embeds `text`
    /// itself; a caller-supplied vector is stored verbatim. Adding the
    /// same ID again overwrites the previous passage.
    pub async fn add(
        &self,
        id: &str,
        text: &str,
        vector: Option<Vec<f32>>,
        source: &str,
        chunk_index: i64,
    ) -> Result<()> {
        let embedding = match vector {
            Some(v) => v,
            None => embedding::embed_query(self.provider.as_ref(), &self.embedding, text).await?,
        };
        let record = PassageRecord {
            id: id.to_string(),
            source: source.to_string(),
            chunk_index,
            text: text.to_string(),
            dims: embedding.len(),
            embedding,
            model: self.provider.model_name().to_string(),
        };
        self.store.upsert(&record).await
    }

    /// Embed many texts with the index's pinned configuration, slicing
    /// the input into `embedding.batch_size` requests.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.embedding.batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let mut batch_vecs =
                embedding::embed_texts(self.provider.as_ref(), &self.embedding, batch).await?;
            vectors.append(&mut batch_vecs);
        }
        Ok(vectors)
    }

    /// Top-`k` passages for a query, best first.
    ///
    /// Failures anywhere in the lookup (embedding the query, reading the
    /// store) are logged and absorbed; callers always get a list, possibly
    /// empty. An empty or whitespace-only query is answered without
    /// touching the embedder.
    pub async fn query(&self, query_text: &str, k: usize) -> Vec<RetrievedPassage> {
        if query_text.trim().is_empty() {
            return Vec::new();
        }
        match self.try_query(query_text, k).await {
            Ok(hits) => hits.into_iter().map(RetrievedPassage::from).collect(),
            Err(e) => {
                tracing::warn!("retrieval failed, returning no passages: {e:#}");
                Vec::new()
            }
        }
    }

    async fn try_query(&self, query_text: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec =
            embedding::embed_query(self.provider.as_ref(), &self.embedding, query_text).await?;
        self.store.search(&query_vec, k).await
    }

    /// Reset the index to empty. Unlike queries, a failed reset is an error.
    /// Ordering against concurrent queries or adds is not defined; each
    /// sees either the old passages or none.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .clear()
            .await
            .context("failed to reset passage index")
    }

    pub async fn count(&self) -> Result<i64> {
        self.store.count().await
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}

/// CLI entry for `medrag clear`.
pub async fn run_clear(config: &Config) -> Result<()> {
    let index = Index::open(config).await?;
    index.clear().await?;
    println!("Index cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use anyhow::bail;
    use async_trait::async_trait;

    fn hash_config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "hash".to_string(),
            ..Default::default()
        }
    }

    fn hash_index() -> Index {
        let config = hash_config();
        let provider = embedding::create_provider(&config).unwrap();
        Index::new(Arc::new(InMemoryStore::new()), provider, config)
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn upsert(&self, _record: &PassageRecord) -> Result<()> {
            bail!("store unavailable")
        }
        async fn search(&self, _query_vec: &[f32], _k: usize) -> Result<Vec<SearchHit>> {
            bail!("store unavailable")
        }
        async fn clear(&self) -> Result<()> {
            bail!("store unavailable")
        }
        async fn count(&self) -> Result<i64> {
            bail!("store unavailable")
        }
    }

    fn failing_index() -> Index {
        let config = hash_config();
        let provider = embedding::create_provider(&config).unwrap();
        Index::new(Arc::new(FailingStore), provider, config)
    }

    #[tokio::test]
    async fn add_embeds_when_no_vector_given() {
        let index = hash_index();
        index
            .add(
                "doc_chunk_0",
                "Metformin is the first-line medication for type 2 diabetes.",
                None,
                "doc.pdf",
                0,
            )
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let results = index.query("What is metformin prescribed for?", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "doc_chunk_0");
        assert_eq!(results[0].source, "doc.pdf");
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn add_stores_supplied_vector_verbatim() {
        let index = hash_index();
        let config = hash_config();
        let provider = embedding::create_provider(&config).unwrap();
        let query_vec = embedding::embed_query(provider.as_ref(), &config, "metformin dose")
            .await
            .unwrap();

        // Text has nothing in common with the query; only the supplied
        // vector can make it the best hit.
        index
            .add("planted", "entirely unrelated words", Some(query_vec), "x.md", 0)
            .await
            .unwrap();
        index
            .add("organic", "some other note about weather", None, "y.md", 0)
            .await
            .unwrap();

        let results = index.query("metformin dose", 2).await;
        assert_eq!(results[0].id, "planted");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn query_on_empty_index_returns_nothing() {
        let index = hash_index();
        assert!(index.query("anything at all", 5).await.is_empty());
    }

    #[tokio::test]
    async fn blank_query_returns_nothing() {
        let index = hash_index();
        assert!(index.query("", 5).await.is_empty());
        assert!(index.query("   \n ", 5).await.is_empty());
    }

    #[tokio::test]
    async fn query_failure_degrades_to_empty() {
        let index = failing_index();
        assert!(index.query("metformin", 5).await.is_empty());
    }

    #[tokio::test]
    async fn clear_failure_is_an_error() {
        let index = failing_index();
        assert!(index.clear().await.is_err());
    }

    #[tokio::test]
    async fn query_ranks_best_first() {
        let index = hash_index();
        index
            .add(
                "metformin",
                "Metformin is the first-line medication for the treatment of type 2 diabetes.",
                None,
                "guide.md",
                0,
            )
            .await
            .unwrap();
        index
            .add(
                "lisinopril",
                "Lisinopril is an ACE inhibitor used to manage hypertension and heart failure.",
                None,
                "guide.md",
                1,
            )
            .await
            .unwrap();
        index
            .add(
                "atorvastatin",
                "Atorvastatin lowers cholesterol by inhibiting HMG-CoA reductase in the liver.",
                None,
                "guide.md",
                2,
            )
            .await
            .unwrap();

        let results = index.query("What is metformin prescribed for?", 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "metformin");
        assert!(results[0].score >= results[1].score);
    }
}
