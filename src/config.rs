use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("documents")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Character budget per chunk for whitespace-delimited chunking of uploads.
    #[serde(default = "default_word_budget")]
    pub word_budget: usize,
    /// Window size in bytes for sliding-window chunking of corpus files.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Bytes repeated between consecutive windows.
    #[serde(default = "default_window_overlap")]
    pub window_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            word_budget: default_word_budget(),
            window_size: default_window_size(),
            window_overlap: default_window_overlap(),
        }
    }
}

fn default_word_budget() -> usize {
    1000
}
fn default_window_size() -> usize {
    300
}
fn default_window_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_chat_url")]
    pub url: String,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            url: default_chat_url(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "llama3.2".to_string()
}
fn default_chat_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_chat_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Wipe the index when the server starts. Off unless a deployment opts in.
    #[serde(default)]
    pub reset_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            reset_on_start: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EvalConfig {
    pub log_path: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.word_budget == 0 {
        anyhow::bail!("chunking.word_budget must be > 0");
    }
    if config.chunking.window_size == 0 {
        anyhow::bail!("chunking.window_size must be > 0");
    }
    if config.chunking.window_overlap >= config.chunking.window_size {
        anyhow::bail!("chunking.window_overlap must be smaller than chunking.window_size");
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "ollama" | "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or hash.",
            other
        ),
    }

    // Ollama cannot report dims up front, so the config must pin them.
    if config.embedding.provider == "ollama" {
        if config.embedding.model.is_none() {
            anyhow::bail!("embedding.model must be specified when provider is 'ollama'");
        }
        if config.embedding.dims.is_none() {
            anyhow::bail!("embedding.dims must be specified when provider is 'ollama'");
        }
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }

    Ok(config)
}
