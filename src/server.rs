//! JSON HTTP server.
//!
//! Exposes the chunker, the checksum engine, the upsert protocol, context
//! retrieval, and search over one shared [`ContextStore`] backed by SQLite.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/tools/chunk` | Split content at heading boundaries |
//! | `POST` | `/tools/fingerprint` | Checksum of content |
//! | `POST` | `/tools/upsert` | Checksum-gated upsert of a context |
//! | `POST` | `/tools/search` | Ranked span search (logs the query) |
//! | `POST` | `/tools/get` | A context and its spans |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /tools/upsert` signals its outcome through the status code:
//! `201` created, `200` updated, `234` unchanged. The body is always
//! `{ "outcome": ..., "context": ... }`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "context id must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unavailable` (503),
//! `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use docspan_core::checksum::fingerprint;
use docspan_core::chunk::chunk;
use docspan_core::context_store::ContextStore;
use docspan_core::models::{empty_meta, ContextWithSpans, Meta, SpanInput};
use docspan_core::search::{search, SearchRequest, SearchResponse};
use docspan_core::{Context, CoreError, Outcome};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Status returned when an upsert found identical content.
pub const UNCHANGED_STATUS: u16 = 234;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<ContextStore<SqliteStore>>,
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;
    let store = ContextStore::new(SqliteStore::new(pool), config.upsert_options());

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(store),
    };
    let app = router(state);

    info!(bind = %bind_addr, "server listening");
    println!("docspan server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/chunk", post(handle_chunk))
        .route("/tools/fingerprint", post(handle_fingerprint))
        .route("/tools/upsert", post(handle_upsert))
        .route("/tools/search", post(handle_search))
        .route("/tools/get", post(handle_get))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// HTTP status carrying an upsert outcome.
pub fn outcome_status(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Created => StatusCode::CREATED,
        Outcome::Updated => StatusCode::OK,
        Outcome::Unchanged => StatusCode::from_u16(UNCHANGED_STATUS).unwrap_or(StatusCode::OK),
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) | CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Storage(_) | CoreError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("request failed: {}", err);
        }
        let code = match &err {
            CoreError::Conflict(_) => "unavailable",
            other => other.code(),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /tools/chunk ============

#[derive(Deserialize)]
struct ChunkRequest {
    content: String,
    /// Falls back to `[chunking].max_heading_depth`.
    max_heading_depth: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChunkResponse {
    chunks: Vec<String>,
}

async fn handle_chunk(
    State(state): State<AppState>,
    Json(req): Json<ChunkRequest>,
) -> Result<Json<ChunkResponse>, AppError> {
    let depth = req
        .max_heading_depth
        .unwrap_or(state.config.chunking.max_heading_depth);
    let chunks = chunk(&req.content, depth)?;
    Ok(Json(ChunkResponse { chunks }))
}

// ============ POST /tools/fingerprint ============

#[derive(Deserialize)]
struct FingerprintRequest {
    content: String,
}

#[derive(Debug, Serialize)]
struct FingerprintResponse {
    checksum: String,
}

async fn handle_fingerprint(Json(req): Json<FingerprintRequest>) -> Json<FingerprintResponse> {
    Json(FingerprintResponse {
        checksum: fingerprint(&req.content),
    })
}

// ============ POST /tools/upsert ============

#[derive(Deserialize)]
struct UpsertRequest {
    id: String,
    content: String,
    #[serde(default = "empty_meta")]
    meta: Meta,
    /// Caller-chunked spans; when absent the content is chunked at headings.
    spans: Option<Vec<SpanInput>>,
}

#[derive(Serialize)]
struct UpsertResponse {
    outcome: Outcome,
    context: Context,
}

async fn handle_upsert(
    State(state): State<AppState>,
    Json(req): Json<UpsertRequest>,
) -> Result<Response, AppError> {
    let (context, outcome) = match req.spans {
        Some(spans) => {
            state
                .store
                .upsert_with_spans(&req.id, &req.content, req.meta, spans)
                .await?
        }
        None => state.store.upsert(&req.id, &req.content, req.meta).await?,
    };

    let status = outcome_status(outcome);
    Ok((status, Json(UpsertResponse { outcome, context })).into_response())
}

// ============ POST /tools/search ============

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    limit: Option<usize>,
    user_id: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError> {
    let limit = req.limit.unwrap_or(state.config.retrieval.final_limit);
    if limit == 0 {
        return Err(bad_request("limit must be >= 1"));
    }
    let request = SearchRequest {
        query: &req.query,
        user_id: req.user_id.as_deref(),
        limit,
    };
    let response = search(state.store.store(), &request).await?;
    Ok(Json(response))
}

// ============ POST /tools/get ============

#[derive(Deserialize)]
struct GetRequest {
    id: String,
}

async fn handle_get(
    State(state): State<AppState>,
    Json(req): Json<GetRequest>,
) -> Result<Json<ContextWithSpans>, AppError> {
    Ok(Json(state.store.get(&req.id).await?))
}
