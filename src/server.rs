//! JSON HTTP API for the query pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Run a natural-language question through the pipeline |
//! | `POST` | `/api/index-schema` | Re-introspect the database and index new schema descriptions |
//! | `GET`  | `/api/history` | Recent audit entries, newest first (`limit`, `offset`) |
//! | `GET`  | `/api/stats` | Query-log counters, table row counts, index stats |
//! | `GET`  | `/api/health` | Health check (version, database reachability, index size) |
//!
//! # Error Contract
//!
//! Transport-level failures return:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! A pipeline that runs to a decision is not a transport failure: retrieval
//! aborts come back as HTTP 200 with `"success": false` in the body, so
//! clients get the reasoning trail and audit semantics either way.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::audit::{fetch_history, HistoryEntry};
use crate::config::Config;
use crate::index::VectorIndex;
use crate::models::QueryResponse;
use crate::pipeline::Orchestrator;
use crate::schema_index::SchemaCatalog;
use crate::stats::{collect_stats, Stats};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub index: Arc<VectorIndex>,
    pub catalog: Arc<SchemaCatalog>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Starts the HTTP server on the configured bind address.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config, state: AppState) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/index-schema", post(handle_index_schema))
        .route("/api/history", get(handle_history))
        .route("/api/stats", get(handle_stats))
        .route("/api/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("finquery server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

/// Handler for `POST /api/query`.
///
/// Validates the question and runs it through the full pipeline. Returns
/// the assembled [`QueryResponse`]; pipeline-level failure is expressed in
/// the body's `success` flag, not the HTTP status.
async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let question = request.query.trim();
    if question.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let response = state.orchestrator.process(question).await;
    Ok(Json(response))
}

// ============ POST /api/index-schema ============

#[derive(Serialize)]
struct IndexSchemaResponse {
    documents_added: usize,
    total_documents: usize,
}

/// Handler for `POST /api/index-schema`.
async fn handle_index_schema(
    State(state): State<AppState>,
) -> Result<Json<IndexSchemaResponse>, AppError> {
    let added = state
        .catalog
        .index_schema()
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(IndexSchemaResponse {
        documents_added: added,
        total_documents: state.index.stats().total_documents,
    }))
}

// ============ GET /api/history ============

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Serialize)]
struct HistoryResponse {
    entries: Vec<HistoryEntry>,
}

/// Handler for `GET /api/history`.
async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    if params.limit < 1 || params.limit > 500 {
        return Err(bad_request("limit must be between 1 and 500"));
    }
    if params.offset < 0 {
        return Err(bad_request("offset must be non-negative"));
    }

    let entries = fetch_history(&state.pool, params.limit, params.offset)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(HistoryResponse { entries }))
}

// ============ GET /api/stats ============

/// Handler for `GET /api/stats`.
async fn handle_stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    let stats = collect_stats(&state.pool, &state.index)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(stats))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    database: String,
    indexed_documents: usize,
}

/// True when the pool can still execute a trivial statement.
async fn database_reachable(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Handler for `GET /api/health`.
///
/// Reports overall status, database reachability, and index size. The
/// status is `"degraded"` when the database ping fails.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = database_reachable(&state.pool).await;
    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_ok { "ok" } else { "unreachable" }.to_string(),
        indexed_documents: state.index.stats().total_documents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_reachable_tracks_pool_state() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        assert!(database_reachable(&pool).await);

        pool.close().await;
        assert!(!database_reachable(&pool).await);
    }
}
