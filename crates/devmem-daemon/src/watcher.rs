//! Debounced filesystem watcher feeding the ingestor.
//!
//! `notify` events land on an unbounded channel into a per-path coalescing
//! task: an `add`/`change` waits for `stability_ms` of silence on that path
//! before ingesting; `unlink` is not debounced. An add immediately followed
//! by an unlink resolves to the final state: if the file is gone when the
//! debounce window elapses, it's treated as a removal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use devmem_core::Ingestor;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone)]
enum Change {
    Upsert(PathBuf),
    Remove(PathBuf),
}

pub struct FileWatcher {
    _inner: notify::RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `root`; every debounced change is run through
    /// `ingestor` on a spawned task. Returns immediately.
    pub fn start(
        root: PathBuf,
        ingestor: Arc<Ingestor>,
        stability_ms: u64,
    ) -> notify::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Change>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            let change = match event.kind {
                EventKind::Remove(_) => event.paths.into_iter().map(Change::Remove).collect::<Vec<_>>(),
                EventKind::Create(_) | EventKind::Modify(_) => {
                    event.paths.into_iter().map(Change::Upsert).collect::<Vec<_>>()
                }
                _ => Vec::new(),
            };
            for c in change {
                let _ = tx.send(c);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        // Per-path debounce state: each path gets its own generation
        // counter; a delayed task only fires if its generation is still
        // current when the stability window elapses.
        let pending: Arc<Mutex<HashMap<PathBuf, u64>>> = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                let (path, is_remove) = match change {
                    Change::Upsert(p) => (p, false),
                    Change::Remove(p) => (p, true),
                };

                if is_remove {
                    // Not debounced: bump the generation so any in-flight
                    // upsert for this path becomes stale, then remove now.
                    let mut guard = pending.lock().await;
                    let generation = guard.entry(path.clone()).or_insert(0);
                    *generation += 1;
                    let ingestor = ingestor.clone();
                    let relative = relative_id(&root, &path);
                    tokio::spawn(async move {
                        let _ = ingestor.remove_file(&relative);
                    });
                    continue;
                }

                let generation = {
                    let mut guard = pending.lock().await;
                    let g = guard.entry(path.clone()).or_insert(0);
                    *g += 1;
                    *g
                };

                let pending = pending.clone();
                let ingestor = ingestor.clone();
                let path_for_task = path.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(stability_ms)).await;
                    let still_current = {
                        let guard = pending.lock().await;
                        guard.get(&path_for_task).copied() == Some(generation)
                    };
                    if !still_current {
                        return;
                    }
                    if !path_for_task.exists() {
                        return;
                    }
                    if let Err(e) = ingestor.ingest_file(&path_for_task, false) {
                        tracing::warn!(path = %path_for_task.display(), error = %e, "watcher ingest failed");
                    }
                });
            }
        });

        Ok(Self { _inner: watcher })
    }
}

fn relative_id(root: &std::path::Path, path: &std::path::Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
