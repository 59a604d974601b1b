//! Drives the daemon's control API in-process via `tower::ServiceExt::oneshot`
//! against a real router/store/vector-index, the way the axum ecosystem
//! tests a service without binding a socket.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use devmem_core::config::Config;
use devmem_core::embeddings::DeterministicHashEmbedder;
use devmem_core::search::QueryRouter;
use devmem_core::{Ingestor, Store, VectorIndex};
use devmem_daemon::api::{build_router, AppState};
use http_body_util::BodyExt;
use tokio::sync::Notify;
use tower::ServiceExt;

async fn state() -> (tempfile::TempDir, Arc<AppState>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn answer() -> i32 { 42 }\n").unwrap();

    let config = Config {
        state_dir: dir.path().join(".devmem-state"),
        debounce_ms: 50,
        ..Config::from_env(dir.path().to_path_buf()).unwrap()
    };
    let project_id = devmem_core::ingest::project_id_of(&config.project_root);

    let store = Arc::new(Store::open(config.db_path()).unwrap());
    let embedder: Arc<dyn devmem_core::Embedder> = Arc::new(DeterministicHashEmbedder::default());
    let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), config.vector_index_dir()));
    let ingestor = Arc::new(Ingestor::new(store.clone(), vectors.clone(), embedder.clone(), config.clone()));
    ingestor.ingest_file(&dir.path().join("lib.rs"), false).unwrap();

    let router = Arc::new(QueryRouter::new(store.clone(), vectors.clone(), embedder, project_id.clone()));

    let app_state = Arc::new(AppState {
        store,
        vectors,
        ingestor,
        router,
        project_id,
        root_path: dir.path().to_string_lossy().into_owned(),
        started_at: Instant::now(),
        watcher_active: AtomicBool::new(true),
        shutdown: Arc::new(Notify::new()),
    });

    (dir, app_state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, state) = state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn status_reflects_watcher_and_store_stats() {
    let (_dir, state) = state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["watcher_active"], true);
    assert_eq!(body["stats"]["total_files"], 1);
}

#[tokio::test]
async fn search_requires_a_query() {
    let (_dir, state) = state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/search").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_finds_the_ingested_file() {
    let (_dir, state) = state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/search?q=lib.rs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let results = body["results"].as_array().unwrap();
    assert!(results.iter().any(|r| r["file"] == "lib.rs"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (_dir, state) = state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stop_wakes_the_shutdown_notify() {
    let (_dir, state) = state().await;
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let waiter = tokio::spawn(async move {
        shutdown.notified().await;
    });

    let response = app
        .oneshot(Request::builder().method("POST").uri("/stop").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::timeout(std::time::Duration::from_secs(2), waiter)
        .await
        .expect("stop should wake the shutdown Notify")
        .unwrap();
}

#[tokio::test]
async fn reindex_accepts_and_runs_in_the_background() {
    let (_dir, state) = state().await;
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().method("POST").uri("/reindex").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "indexing");
}
