//! # MedRAG CLI (`medrag`)
//!
//! The `medrag` binary is the primary interface for MedRAG. It provides
//! commands for database initialization, document ingestion, passage
//! retrieval, retrieval-augmented chat, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! medrag --config ./config/medrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medrag init` | Create the SQLite database and run schema migrations |
//! | `medrag ingest <files>` | Ingest PDF, Markdown, or plain-text files |
//! | `medrag load` | Ingest the configured corpus directory |
//! | `medrag query "<question>"` | Retrieve the best-matching passages |
//! | `medrag ask "<question>"` | Answer a question with retrieved context |
//! | `medrag clear` | Delete every indexed passage |
//! | `medrag stats` | Show index statistics |
//! | `medrag serve` | Start the HTTP server |
//! | `medrag eval report` | Summarize logged chat interactions |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! medrag init --config ./config/medrag.toml
//!
//! # Ingest a couple of documents
//! medrag ingest guidelines.pdf notes.md
//!
//! # Load the corpus directory from config
//! medrag load
//!
//! # Retrieve passages
//! medrag query "first-line treatment for type 2 diabetes"
//!
//! # Ask with generation (requires Ollama)
//! medrag ask "What are the common side effects of metformin?"
//!
//! # Start the HTTP API
//! medrag serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use medrag::{chat, config, eval, index, ingest, migrate, retrieve, server, stats};

/// MedRAG CLI — a local-first retrieval-augmented question answering
/// service for medical documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/medrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "medrag",
    about = "MedRAG — local-first retrieval-augmented question answering over medical documents",
    version,
    long_about = "MedRAG ingests medical documents (PDF, Markdown, plain text), chunks and embeds \
    them into a local SQLite index, and answers questions over the indexed passages via a CLI and \
    an HTTP API. Generation uses a local Ollama instance; retrieval itself needs no network."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/medrag.toml`. Database, corpus, chunking,
    /// embedding, chat, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/medrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the passages table.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest documents from explicit file paths.
    ///
    /// Reads each file, extracts its text (PDF, Markdown, or plain text),
    /// splits it into word-bounded passages, embeds them, and writes them
    /// to the index. A file that fails is reported and skipped; passages
    /// already written for it are kept.
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ingest the corpus directory from config.
    ///
    /// Scans `[corpus].dir` for files matching the include globs, splits
    /// each one into overlapping windows, embeds them in batches, and
    /// writes them to the index. Re-running after an edit overwrites the
    /// affected passages in place.
    Load,

    /// Retrieve the best-matching passages for a query.
    ///
    /// Embeds the query, ranks indexed passages by cosine similarity,
    /// and prints the top results with scores and sources.
    Query {
        /// The question or search phrase.
        query: String,

        /// Number of passages to return (defaults to `[retrieval].k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question using retrieved passages as context.
    ///
    /// Retrieves the top passages for the question, sends them with the
    /// question to the configured Ollama chat model, and prints the
    /// answer with its sources. Requires Ollama to be running.
    Ask {
        /// The question to answer.
        query: String,

        /// Number of passages to use as context (defaults to `[retrieval].k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Delete every indexed passage.
    ///
    /// Drops and recreates the passages table. The next ingest starts
    /// from an empty index.
    Clear,

    /// Show index statistics.
    ///
    /// Prints passage and document counts, the embedding models in use,
    /// database size, and a per-document breakdown.
    Stats,

    /// Start the HTTP server.
    ///
    /// Exposes upload, query, and chat endpoints as a JSON API. The bind
    /// address comes from `[server].bind` in the config file.
    Serve,

    /// Interaction log reports.
    ///
    /// Subcommands for summarizing the JSONL interaction log written by
    /// the chat endpoint when `[eval].log_path` is set.
    Eval {
        #[command(subcommand)]
        action: EvalAction,
    },
}

/// Interaction log subcommands.
#[derive(Subcommand)]
enum EvalAction {
    /// Summarize logged chat interactions.
    ///
    /// Prints interaction counts, context usage, and latency percentiles
    /// computed from the log file.
    Report,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays scriptable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("medrag=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { files } => {
            ingest::run_ingest(&cfg, &files).await?;
        }
        Commands::Load => {
            ingest::run_load(&cfg).await?;
        }
        Commands::Query { query, k } => {
            retrieve::run_query(&cfg, &query, k).await?;
        }
        Commands::Ask { query, k } => {
            chat::run_ask(&cfg, &query, k).await?;
        }
        Commands::Clear => {
            index::run_clear(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Eval { action } => match action {
            EvalAction::Report => {
                eval::run_report(&cfg)?;
            }
        },
    }

    Ok(())
}
