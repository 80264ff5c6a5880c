//! # MedRAG
//!
//! A local-first retrieval-augmented question answering service for
//! medical documents.
//!
//! MedRAG extracts text from PDF, Markdown, and plain-text documents,
//! chunks and embeds it into a local SQLite index, and answers questions
//! over the indexed passages via a CLI and an HTTP API. Generation uses a
//! local Ollama instance; retrieval itself needs no network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Documents  │──▶│  Pipeline    │──▶│  SQLite   │
//! │ PDF/MD/TXT  │   │ Chunk+Embed │   │ Passages  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │ (medrag) │       │  (JSON)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medrag init                   # create database
//! medrag ingest notes.pdf       # ingest explicit files
//! medrag load                   # ingest the corpus directory
//! medrag query "metformin dosing"
//! medrag ask "How is type 2 diabetes treated?"
//! medrag serve                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction from document bytes |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding providers and vector math |
//! | [`store`] | Vector store backends |
//! | [`index`] | The passage index tying store and embedder together |
//! | [`ingest`] | Document and corpus ingestion |
//! | [`retrieve`] | Top-K passage retrieval |
//! | [`chat`] | Retrieval-augmented answering via Ollama |
//! | [`server`] | HTTP API server |
//! | [`eval`] | Interaction logging and reports |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod eval;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod stats;
pub mod store;
