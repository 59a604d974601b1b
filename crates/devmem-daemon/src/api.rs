//! Local-loopback control API: status, health, reindex, search, stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use devmem_core::search::{QueryRouter, SearchOptions};
use devmem_core::{Ingestor, Store};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

pub struct AppState {
    pub store: Arc<Store>,
    pub vectors: Arc<devmem_core::VectorIndex>,
    pub ingestor: Arc<Ingestor>,
    pub router: Arc<QueryRouter>,
    pub project_id: String,
    pub root_path: String,
    pub started_at: Instant,
    pub watcher_active: AtomicBool,
    pub shutdown: Arc<Notify>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/reindex", post(reindex))
        .route("/search", get(search))
        .route("/stop", post(stop))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    root_path: String,
    project_id: String,
    watcher_active: bool,
    uptime_s: u64,
    stats: devmem_core::storage::StoreStats,
    vector_documents: usize,
    errors: u64,
    last_error: Option<String>,
    degraded: bool,
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    let stats = state.store.stats(&state.project_id).unwrap_or_default();
    let vector_stats = state.vectors.stats();
    let ingest_stats = state.ingestor.stats();
    let degraded = ingest_stats.errors > 0;
    let body = StatusResponse {
        status: if degraded { "degraded" } else { "ok" },
        root_path: state.root_path.clone(),
        project_id: state.project_id.clone(),
        watcher_active: state.watcher_active.load(Ordering::Relaxed),
        uptime_s: state.started_at.elapsed().as_secs(),
        stats,
        vector_documents: vector_stats.total_documents,
        errors: ingest_stats.errors,
        last_error: ingest_stats.last_error,
        degraded,
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_s: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let degraded = state.ingestor.stats().errors > 0;
    let body = HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        uptime_s: state.started_at.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[derive(Deserialize)]
struct ReindexParams {
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct ReindexResponse {
    status: &'static str,
    force: bool,
}

async fn reindex(State(state): State<Arc<AppState>>, Query(params): Query<ReindexParams>) -> Response {
    let ingestor = state.ingestor.clone();
    let force = params.force;
    tokio::spawn(async move {
        let stats = ingestor.index_all(force).await;
        tracing::info!(indexed = stats.indexed_files, skipped = stats.skipped_files, errors = stats.errors, "reindex complete");
    });
    (StatusCode::ACCEPTED, Json(ReindexResponse { status: "indexing", force })).into_response()
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    lang: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<devmem_core::search::SearchResult>,
}

async fn search(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> Response {
    let Some(query) = params.q.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: "missing query parameter 'q'".into(), degraded: false }),
        )
            .into_response();
    };

    let opts = SearchOptions {
        language: params.lang,
        limit: params.limit.unwrap_or(20),
        max_snippets: 3,
    };

    match state.router.hybrid_search(&query, &opts) {
        Ok(results) => (StatusCode::OK, Json(SearchResponse { query, results })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Serialize)]
struct StopResponse {
    status: &'static str,
}

async fn stop(State(state): State<Arc<AppState>>) -> Response {
    state.shutdown.notify_waiters();
    (StatusCode::OK, Json(StopResponse { status: "stopping" })).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: "not found".into(), degraded: false })).into_response()
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    degraded: bool,
}

/// Maps the router's error taxonomy onto HTTP status: a missing query is
/// caller error (400); a vector/embedding/store failure is a 500 and flags
/// `degraded` on the response body so a caller can distinguish it from a bad
/// request.
fn error_response(e: devmem_core::error::RouterError) -> Response {
    use devmem_core::error::RouterError;
    let (code, degraded) = match &e {
        RouterError::EmptyQuery => (StatusCode::BAD_REQUEST, false),
        RouterError::Vector(_) | RouterError::Embed(_) | RouterError::Storage(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, true)
        }
    };
    (code, Json(ErrorBody { error: e.to_string(), degraded })).into_response()
}
