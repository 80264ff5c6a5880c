//! HTTP API server.
//!
//! Exposes the ingestion and retrieval pipeline as a small JSON API for
//! frontends and scripts.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check, reports the crate version |
//! | `POST` | `/upload` | Multipart PDF upload, extracted and indexed |
//! | `POST` | `/query` | Top-K passage retrieval |
//! | `POST` | `/chat` | Retrieval-augmented answer via Ollama |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `ingest_error` (500),
//! `chat_unavailable` (502).
//!
//! # Concurrency
//!
//! Every request goes through one process-wide [`Index`]. Handlers do not
//! serialize against each other: a reset racing an in-flight query or
//! upload is not ordered, and the affected request sees either the old or
//! the new table.
//!
//! # CORS
//!
//! Any origin, method, and header is allowed so browser frontends can
//! call the API directly.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat;
use crate::config::Config;
use crate::eval;
use crate::index::Index;
use crate::ingest;
use crate::models::RetrievedPassage;

/// Uploads above this size are rejected before extraction.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// State shared by every route handler.
#[derive(Clone)]
struct AppState {
    /// Parsed configuration, shared across handlers.
    config: Arc<Config>,
    /// The process-wide passage index.
    index: Arc<Index>,
}

/// Starts the HTTP server on the `[server].bind` address and serves
/// until the process is terminated.
///
/// With `server.reset_on_start = true` the index is wiped before the
/// listener comes up; a failed reset aborts startup.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let index = Arc::new(Index::open(config).await?);

    if config.server.reset_on_start {
        index.clear().await?;
        tracing::info!("index cleared on startup");
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        index,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/chat", post(handle_chat))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    println!("medrag server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 error for ingestion failures.
fn ingest_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "ingest_error".to_string(),
        message: message.into(),
    }
}

/// Constructs a 502 error for an unreachable or failing chat backend.
fn chat_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "chat_unavailable".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

/// JSON response body for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    passages_added: u64,
}

/// Handler for `POST /upload`.
///
/// Accepts a multipart form with a `file` field holding a PDF. Anything
/// that is not a PDF is rejected with 400 before extraction; extraction
/// or indexing failures come back as 500 and leave no partial passages
/// beyond those already written.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| bad_request("file field must include a filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| bad_request("multipart field 'file' is required"))?;

    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(bad_request("Only PDF files are supported"));
    }

    let report = ingest::ingest_document(&state.index, &state.config, &filename, &bytes)
        .await
        .map_err(|e| ingest_error(format!("{:#}", e)))?;

    Ok(Json(UploadResponse {
        filename,
        passages_added: report.passages,
    }))
}

// ============ POST /query ============

/// JSON request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    k: Option<usize>,
}

/// JSON response body for `POST /query`.
#[derive(Serialize)]
struct QueryResponse {
    results: Vec<RetrievedPassage>,
}

/// Handler for `POST /query`.
///
/// Retrieval is best-effort: an empty store, a blank query, or a failing
/// lookup all produce an empty result list, never an error status.
async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Json<QueryResponse> {
    let k = req.k.unwrap_or(state.config.retrieval.k);
    let results = state.index.query(&req.query, k).await;
    Json(QueryResponse { results })
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    k: Option<usize>,
}

/// JSON response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
    context_used: bool,
    relevant_docs_count: usize,
}

/// Handler for `POST /chat`.
///
/// Retrieves context for the query, asks the chat model, and logs the
/// interaction when an eval log is configured. Retrieval failures degrade
/// to an empty context; a chat backend failure is a 502.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let started = std::time::Instant::now();
    let k = req.k.unwrap_or(state.config.retrieval.k);
    let passages = state.index.query(&req.query, k).await;
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let answer = chat::generate_answer(&state.config.chat, &req.query, &context)
        .await
        .map_err(|e| chat_unavailable(format!("{:#}", e)))?;

    if let Some(log_path) = &state.config.eval.log_path {
        let record = eval::InteractionRecord::new(
            &req.query,
            answer.len(),
            passages.len(),
            started.elapsed().as_millis() as u64,
        );
        if let Err(e) = eval::append_interaction(log_path, &record) {
            tracing::warn!("failed to append interaction log: {e:#}");
        }
    }

    Ok(Json(ChatResponse {
        response: answer,
        context_used: !passages.is_empty(),
        relevant_docs_count: passages.len(),
    }))
}
