//! Retrieval entry points over the passage index.

use anyhow::Result;

use crate::config::Config;
use crate::index::Index;

/// Return the text of the top `k` passages for `query`, best first.
///
/// Best-effort: failures inside the index are absorbed and an empty list
/// comes back, so callers can always build a (possibly empty) context.
pub async fn retrieve(index: &Index, query: &str, k: usize) -> Vec<String> {
    index
        .query(query, k)
        .await
        .into_iter()
        .map(|p| p.text)
        .collect()
}

/// CLI entry for `medrag query`.
pub async fn run_query(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.k);
    let index = Index::open(config).await?;
    let results = index.query(query, k).await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, passage) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}#{}",
            i + 1,
            passage.score,
            passage.source,
            passage.chunk_index
        );
        let preview: String = passage.text.chars().take(240).collect();
        println!("   {}", preview);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::embedding::create_provider;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn hash_index() -> Index {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        Index::new(Arc::new(InMemoryStore::new()), provider, config)
    }

    #[tokio::test]
    async fn retrieve_returns_passage_texts_best_first() {
        let index = hash_index();
        index
            .add(
                "a",
                "Amoxicillin is a penicillin antibiotic for bacterial infections.",
                None,
                "abx.md",
                0,
            )
            .await
            .unwrap();
        index
            .add(
                "b",
                "Ibuprofen reduces inflammation and relieves mild pain.",
                None,
                "nsaid.md",
                0,
            )
            .await
            .unwrap();

        let texts = retrieve(&index, "penicillin antibiotic", 2).await;
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Amoxicillin"));
    }

    #[tokio::test]
    async fn retrieve_on_empty_index_is_empty() {
        let index = hash_index();
        assert!(retrieve(&index, "anything", 5).await.is_empty());
    }
}
