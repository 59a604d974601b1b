//! devmemd: the long-lived per-project daemon, a filesystem watcher, local
//! HTTP control API, and single-instance discipline layered over
//! devmem-core's store, vector index, ingestor, router, and consolidator.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use devmem_core::config::Config;
use devmem_core::embeddings::DeterministicHashEmbedder;
use devmem_core::search::QueryRouter;
use devmem_core::{Consolidator, Embedder, Ingestor, Store, VectorIndex};
use devmem_daemon::singleton::{deterministic_port, resolve_ownership, Ownership, PidFile};
use devmem_daemon::{api, watcher};
use tokio::sync::Notify;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    project_root: PathBuf,
    initial: bool,
    port: Option<u16>,
}

/// Parse command-line arguments. Exits the process directly for `--help`
/// and `--version`, matching the informational-exit convention used
/// elsewhere in this codebase's binaries.
fn parse_args() -> Args {
    let raw: Vec<String> = std::env::args().collect();
    let mut project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut initial = false;
    let mut port = None;
    let mut i = 1;

    while i < raw.len() {
        match raw[i].as_str() {
            "--help" | "-h" => {
                println!("devmemd {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Local-first developer memory daemon: watches a project tree,");
                println!("keeps the dual store in sync, and serves a loopback control API.");
                println!();
                println!("USAGE:");
                println!("    devmemd [OPTIONS] [PROJECT_ROOT]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help          Print help information");
                println!("    -V, --version       Print version information");
                println!("    --initial           Run a full index before accepting watcher events");
                println!("    --port <PORT>       Override the deterministic control-API port");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG, DEVMEM_PROJECT_ID, DEVMEM_STATE_DIR, DEVMEM_DB_PATH,");
                println!("    DEVMEM_DAEMON_PORT, DEVMEM_VECTOR_COLLECTION_PREFIX,");
                println!("    DEVMEM_MAX_FILE_SIZE, DEVMEM_IGNORE_GLOBS, DEVMEM_CHUNK_SIZE,");
                println!("    DEVMEM_CHUNK_OVERLAP, DEVMEM_DEBOUNCE_MS,");
                println!("    DEVMEM_CONSOLIDATION_INTERVAL_SECS");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("devmemd {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--initial" => initial = true,
            "--port" => {
                i += 1;
                match raw.get(i).and_then(|v| v.parse().ok()) {
                    Some(p) => port = Some(p),
                    None => {
                        eprintln!("error: --port requires a numeric argument");
                        std::process::exit(1);
                    }
                }
            }
            arg if arg.starts_with("--port=") => match arg.trim_start_matches("--port=").parse() {
                Ok(p) => port = Some(p),
                Err(_) => {
                    eprintln!("error: --port requires a numeric argument");
                    std::process::exit(1);
                }
            },
            arg if !arg.starts_with('-') => project_root = PathBuf::from(arg),
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'devmemd --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Args { project_root, initial, port }
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    let project_root = match std::fs::canonicalize(&args.project_root) {
        Ok(p) => p,
        Err(e) => {
            error!(path = %args.project_root.display(), error = %e, "project root does not exist");
            std::process::exit(1);
        }
    };

    let config = match Config::from_env(project_root.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let project_id = config.project_id.clone();
    let root_path = project_root.to_string_lossy().into_owned();
    let port = args
        .port
        .or(config.daemon_port)
        .unwrap_or_else(|| deterministic_port(&project_id));
    let pid_path = config.pid_file(&project_id);

    if let Err(code) = claim_singleton(&pid_path, &root_path, port).await {
        std::process::exit(code);
    }

    info!(project_id, port, root = %root_path, "devmemd starting");

    let store = match Store::open(config.db_path()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open store");
            PidFile::remove(&pid_path);
            std::process::exit(4);
        }
    };

    let embedder: Arc<dyn Embedder> = Arc::new(DeterministicHashEmbedder::default());
    let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), config.vector_index_dir()));
    for collection in [
        devmem_core::model::Collection::Code,
        devmem_core::model::Collection::Learnings,
        devmem_core::model::Collection::Sessions,
    ] {
        // A sidecar present but unreadable/corrupt means the on-disk index
        // can't be trusted; `Ok(false)` (no sidecar yet) is the normal
        // first-run case and isn't an error.
        if let Err(e) = vectors.load(&collection.key(&config.vector_collection_prefix)) {
            error!(collection = collection.suffix(), error = %e, "vector index unreachable at startup");
            PidFile::remove(&pid_path);
            std::process::exit(3);
        }
    }

    let ingestor = Arc::new(Ingestor::new(store.clone(), vectors.clone(), embedder.clone(), config.clone()));
    let router = Arc::new(QueryRouter::with_collection_prefix(
        store.clone(),
        vectors.clone(),
        embedder.clone(),
        project_id.clone(),
        config.vector_collection_prefix.clone(),
    ));
    let consolidator = Arc::new(Consolidator::new(
        store.clone(),
        vectors.clone(),
        embedder.clone(),
        None,
        config.vector_collection_prefix.clone(),
    ));

    if args.initial {
        let stats = ingestor.index_all(false).await;
        info!(indexed = stats.indexed_files, skipped = stats.skipped_files, errors = stats.errors, "initial scan complete");
    }

    let shutdown = Arc::new(Notify::new());
    let state = Arc::new(api::AppState {
        store: store.clone(),
        vectors: vectors.clone(),
        ingestor: ingestor.clone(),
        router,
        project_id: project_id.clone(),
        root_path: root_path.clone(),
        started_at: Instant::now(),
        watcher_active: AtomicBool::new(false),
        shutdown: shutdown.clone(),
    });

    let watcher = match watcher::FileWatcher::start(project_root.clone(), ingestor.clone(), config.debounce_ms) {
        Ok(w) => {
            state.watcher_active.store(true, Ordering::Relaxed);
            Some(w)
        }
        Err(e) => {
            warn!(error = %e, "filesystem watcher failed to start; continuing without live updates");
            None
        }
    };

    spawn_consolidation_loop(consolidator, config.consolidation_interval_secs);

    let app = api::build_router(state.clone());
    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(port, error = %e, "failed to bind control API port");
            PidFile::remove(&pid_path);
            std::process::exit(2);
        }
    };

    info!(port, "control API listening");

    let shutdown_signal = shutdown.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        tokio::select! {
            _ = shutdown_signal.notified() => info!("stop requested via control API"),
            _ = wait_for_terminate_signal() => info!("received termination signal"),
        }
    });

    if let Err(e) = serve.await {
        error!(error = %e, "control API server error");
    }

    drop(watcher);
    if let Err(e) = vectors.save() {
        warn!(error = %e, "failed to persist vector index on shutdown");
    }
    PidFile::remove(&pid_path);
    info!("devmemd shut down cleanly");
}

/// Attempt to become the sole owner of `pid_path`. On a live foreign owner
/// for the same project, try one graceful takeover via `/stop`; on a
/// different project's owner, fail fast. Returns the process exit code to
/// use on failure.
async fn claim_singleton(pid_path: &std::path::Path, root_path: &str, port: u16) -> Result<(), i32> {
    match resolve_ownership(pid_path, root_path) {
        Ok(Ownership::Free) | Ok(Ownership::StaleReclaimed) => {}
        Ok(Ownership::OwnedBySameProject { port: owner_port }) => {
            let client = reqwest::Client::new();
            let stop_url = format!("http://127.0.0.1:{owner_port}/stop");
            if client.post(&stop_url).send().await.is_ok() {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                PidFile::remove(pid_path);
            } else {
                error!(port = owner_port, "another daemon owns this project and did not respond to takeover");
                return Err(2);
            }
        }
        Ok(Ownership::OwnedByOtherProject { port: owner_port, root_path: other_root }) => {
            error!(port = owner_port, other_root, "port is owned by a different project's daemon");
            return Err(2);
        }
        Err(e) => {
            error!(error = %e, "failed to inspect pid file");
            return Err(1);
        }
    }

    if let Err(e) = PidFile::write(pid_path, port, root_path) {
        error!(error = %e, "failed to write pid file");
        return Err(1);
    }
    Ok(())
}

fn spawn_consolidation_loop(consolidator: Arc<Consolidator>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            match tokio::task::spawn_blocking({
                let consolidator = consolidator.clone();
                move || consolidator.run(None, false)
            })
            .await
            {
                Ok(Ok(report)) => {
                    if report.merged_count > 0 {
                        info!(merged = report.merged_count, links_updated = report.links_updated, "consolidation pass complete");
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "consolidation pass failed"),
                Err(e) => warn!(error = %e, "consolidation task panicked"),
            }
        }
    });
}

async fn wait_for_terminate_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
