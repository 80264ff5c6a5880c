//! Ingestion pipeline orchestration.
//!
//! Two paths feed the index. Uploaded documents (PDF, markdown, plain
//! text) are extracted and split on word boundaries; each chunk is
//! embedded by the index as it is added. Corpus loads walk the configured
//! directory, split files into overlapping windows, and embed them in
//! batches before writing.
//!
//! A failure while ingesting a document aborts that document; passages
//! already written for it stay in the index. Batch runs log the failure,
//! count the file as skipped, and move on.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::chunk::{chunk_text, ChunkingPolicy};
use crate::config::Config;
use crate::extract;
use crate::index::Index;
use crate::models::IngestReport;

/// Ingest one uploaded document given its filename and raw bytes.
///
/// Passage IDs are `{filename}_chunk_{i}`, so re-ingesting the same file
/// overwrites its previous passages instead of duplicating them.
pub async fn ingest_document(
    index: &Index,
    config: &Config,
    filename: &str,
    bytes: &[u8],
) -> Result<IngestReport> {
    let content_type = extract::content_type_for_path(Path::new(filename))
        .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {}", filename))?;

    let text = extract::extract_text(bytes, content_type)
        .with_context(|| format!("Failed to ingest {}", filename))?;

    let policy = ChunkingPolicy::WordBounded {
        budget: config.chunking.word_budget,
    };
    let chunks = chunk_text(policy, &text);

    for (i, chunk) in chunks.iter().enumerate() {
        index
            .add(
                &format!("{}_chunk_{}", filename, i),
                chunk,
                None,
                filename,
                i as i64,
            )
            .await
            .with_context(|| format!("Failed to ingest {}", filename))?;
    }

    Ok(IngestReport {
        documents: 1,
        passages: chunks.len() as u64,
        skipped: 0,
    })
}

/// Load every matching file under the corpus directory into the index.
///
/// Files are chunked into overlapping windows and embedded in batches.
/// Passage IDs are `{path}-{i}` with the path relative to the corpus
/// directory, so reloading the corpus overwrites in place.
pub async fn load_corpus(index: &Index, config: &Config) -> Result<IngestReport> {
    let files = scan_corpus(config)?;
    let mut report = IngestReport::default();

    for (path, rel) in &files {
        match load_corpus_file(index, config, path, rel).await {
            Ok(passages) => {
                report.documents += 1;
                report.passages += passages;
            }
            Err(e) => {
                tracing::warn!("skipping {}: {e:#}", rel);
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

async fn load_corpus_file(index: &Index, config: &Config, path: &Path, rel: &str) -> Result<u64> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let policy = ChunkingPolicy::SlidingWindow {
        size: config.chunking.window_size,
        overlap: config.chunking.window_overlap,
    };
    let chunks = chunk_text(policy, &text);

    let vectors = index
        .embed_batch(&chunks)
        .await
        .with_context(|| format!("Failed to embed {}", rel))?;

    for (i, (chunk, vector)) in chunks.iter().zip(vectors.into_iter()).enumerate() {
        index
            .add(&format!("{}-{}", rel, i), chunk, Some(vector), rel, i as i64)
            .await
            .with_context(|| format!("Failed to load {}", rel))?;
    }

    Ok(chunks.len() as u64)
}

/// Walk the corpus directory and return matching files in stable order,
/// paired with their path relative to the corpus root.
fn scan_corpus(config: &Config) -> Result<Vec<(PathBuf, String)>> {
    let root = &config.corpus.dir;
    if !root.exists() {
        bail!("Corpus directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.corpus.include_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push((path.to_path_buf(), rel_str));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.1.cmp(&b.1));

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// CLI entry for `medrag ingest <files>`.
pub async fn run_ingest(config: &Config, files: &[PathBuf]) -> Result<()> {
    let index = Index::open(config).await?;

    let mut report = IngestReport::default();
    for path in files {
        match ingest_file(&index, config, path).await {
            Ok(file_report) => {
                report.documents += file_report.documents;
                report.passages += file_report.passages;
            }
            Err(e) => {
                tracing::warn!("skipping {}: {e:#}", path.display());
                report.skipped += 1;
            }
        }
    }

    println!("ingest");
    println!("  files: {}", report.documents);
    println!("  passages written: {}", report.passages);
    if report.skipped > 0 {
        println!("  skipped: {}", report.skipped);
    }
    println!("ok");

    Ok(())
}

async fn ingest_file(index: &Index, config: &Config, path: &Path) -> Result<IngestReport> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("Not a file path: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    ingest_document(index, config, &filename, &bytes).await
}

/// CLI entry for `medrag load`.
pub async fn run_load(config: &Config) -> Result<()> {
    let index = Index::open(config).await?;
    let report = load_corpus(&index, config).await?;

    println!("load {}", config.corpus.dir.display());
    println!("  files: {}", report.documents);
    println!("  passages written: {}", report.passages);
    if report.skipped > 0 {
        println!("  skipped: {}", report.skipped);
    }
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ChatConfig, ChunkingConfig, CorpusConfig, DbConfig, EmbeddingConfig, EvalConfig,
        RetrievalConfig, ServerConfig,
    };
    use crate::embedding::create_provider;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn test_config(corpus_dir: PathBuf) -> Config {
        Config {
            db: DbConfig {
                path: PathBuf::from("unused.db"),
            },
            corpus: CorpusConfig {
                dir: corpus_dir,
                include_globs: vec!["**/*.md".to_string()],
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig {
                provider: "hash".to_string(),
                ..Default::default()
            },
            chat: ChatConfig::default(),
            server: ServerConfig::default(),
            eval: EvalConfig::default(),
        }
    }

    fn test_index(config: &Config) -> Index {
        let provider = create_provider(&config.embedding).unwrap();
        Index::new(
            Arc::new(InMemoryStore::new()),
            provider,
            config.embedding.clone(),
        )
    }

    #[tokio::test]
    async fn ingest_markdown_bytes_writes_passages() {
        let config = test_config(PathBuf::from("unused"));
        let index = test_index(&config);

        let report = ingest_document(
            &index,
            &config,
            "note.md",
            b"Aspirin irreversibly inhibits cyclooxygenase in platelets.",
        )
        .await
        .unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.passages, 1);
        assert_eq!(index.count().await.unwrap(), 1);

        let results = index.query("aspirin platelets", 5).await;
        assert_eq!(results[0].id, "note.md_chunk_0");
        assert_eq!(results[0].source, "note.md");
        assert_eq!(results[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn reingesting_a_file_does_not_duplicate() {
        let config = test_config(PathBuf::from("unused"));
        let index = test_index(&config);
        let bytes = b"Warfarin requires regular INR monitoring to stay in range.";

        ingest_document(&index, &config, "warfarin.md", bytes)
            .await
            .unwrap();
        ingest_document(&index, &config, "warfarin.md", bytes)
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let config = test_config(PathBuf::from("unused"));
        let index = test_index(&config);

        let err = ingest_document(&index, &config, "scan.docx", b"whatever")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_pdf_aborts_the_document() {
        let config = test_config(PathBuf::from("unused"));
        let index = test_index(&config);

        let result = ingest_document(&index, &config, "broken.pdf", b"not a pdf at all").await;
        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn load_corpus_walks_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("metformin.md"),
            "Metformin is the first-line medication for the treatment of type 2 diabetes.",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("lisinopril.md"),
            "Lisinopril is an ACE inhibitor used to manage hypertension.",
        )
        .unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not part of the corpus").unwrap();

        let config = test_config(dir.path().to_path_buf());
        let index = test_index(&config);

        let report = load_corpus(&index, &config).await.unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.passages, 2);
        assert_eq!(index.count().await.unwrap(), 2);

        let results = index.query("What is metformin prescribed for?", 1).await;
        assert_eq!(results[0].id, "metformin.md-0");

        // Reloading overwrites in place.
        load_corpus(&index, &config).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn load_corpus_skips_files_that_fail() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("good.md"),
            "Atorvastatin lowers LDL cholesterol and cardiovascular risk.",
        )
        .unwrap();
        // Invalid UTF-8, unreadable as text.
        std::fs::write(dir.path().join("bad.md"), [0xffu8, 0xfe, 0x80]).unwrap();

        let config = test_config(dir.path().to_path_buf());
        let index = test_index(&config);

        let report = load_corpus(&index, &config).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn load_corpus_missing_directory_is_an_error() {
        let config = test_config(PathBuf::from("/definitely/not/here"));
        let index = test_index(&config);
        assert!(load_corpus(&index, &config).await.is_err());
    }
}
