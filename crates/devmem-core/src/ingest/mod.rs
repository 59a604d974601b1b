pub mod language;
pub mod metadata;
pub mod patterns;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use content_hash::fingerprint;

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::model::{ChunkMetadata, CodeFile, Collection};
use crate::search::vector::{chunk_text, VectorIndex};
use crate::storage::Store;

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct IngestStats {
    pub indexed_files: u64,
    pub skipped_files: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}

pub enum IngestOutcome {
    Indexed { file: CodeFile },
    Skipped { reason: &'static str },
    Unchanged,
}

/// Coordinates one file's journey through filter → canonicalize → detect →
/// extract → chunk+embed → dual-store commit, serialized per `file_id` so
/// concurrent watcher events on the same path can't race each other.
pub struct Ingestor {
    store: Arc<Store>,
    vectors: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    config: Config,
    file_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    stats: Mutex<IngestStats>,
}

impl Ingestor {
    pub fn new(store: Arc<Store>, vectors: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        Self {
            store,
            vectors,
            embedder,
            config,
            file_locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats.lock().unwrap().clone()
    }

    fn record_error(&self, message: String) {
        let mut stats = self.stats.lock().unwrap();
        stats.errors += 1;
        stats.last_error = Some(message);
    }

    fn lock_for(&self, file_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().unwrap();
        locks.entry(file_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Ingest one absolute file path relative to the configured project root.
    pub fn ingest_file(&self, absolute_path: &Path, force: bool) -> Result<IngestOutcome, IngestError> {
        let project_root = &self.config.project_root;

        let relative = match absolute_path.strip_prefix(project_root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => absolute_path.to_string_lossy().replace('\\', "/"),
        };

        if language::is_ignored(&relative, &self.config.ignore_globs) {
            self.stats.lock().unwrap().skipped_files += 1;
            return Ok(IngestOutcome::Skipped { reason: "ignored" });
        }

        let metadata = match std::fs::metadata(absolute_path) {
            Ok(m) => m,
            Err(e) => {
                let message = e.to_string();
                self.record_error(message);
                return Err(IngestError::UnreadableFile { path: relative, source: e });
            }
        };

        if metadata.len() == 0 {
            self.stats.lock().unwrap().skipped_files += 1;
            return Ok(IngestOutcome::Skipped { reason: "empty" });
        }
        if metadata.len() > self.config.max_file_size {
            self.stats.lock().unwrap().skipped_files += 1;
            return Ok(IngestOutcome::Skipped { reason: "too_large" });
        }

        let lock = self.lock_for(&relative);
        let _guard = lock.lock().unwrap();

        let mtime: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        if !force {
            if let Ok(Some(existing)) = self.store.get_code_file(&relative) {
                if existing.mtime == mtime && existing.size_bytes == metadata.len() as i64 {
                    return Ok(IngestOutcome::Unchanged);
                }
            }
        }

        let content = std::fs::read_to_string(absolute_path)
            .map_err(|e| IngestError::UnreadableFile { path: relative.clone(), source: e })?;

        let real_path = std::fs::canonicalize(absolute_path).unwrap_or_else(|_| absolute_path.to_path_buf());
        let is_external = !real_path.starts_with(project_root);

        let language = language::detect(absolute_path);
        let extracted = metadata::extract(language, &content);
        let symbols = extracted.into_symbols(&relative);
        let detected_patterns = patterns::detect(&relative, &content);

        let project_id = self.config.project_id.clone();
        let collection_prefix = &self.config.vector_collection_prefix;
        let chunks = chunk_text(&content);
        let chunk_count = chunks.len();
        let symbol_names: Vec<String> = symbols.iter().map(|s| s.name.clone()).collect();

        let embed_result = self.embed_chunks(&relative, collection_prefix, language, &symbol_names, chunks);

        let now = Utc::now();
        let file = CodeFile {
            id: relative.clone(),
            real_path: real_path.to_string_lossy().into_owned(),
            project_id: project_id.clone(),
            language,
            line_count: content.lines().count() as i64,
            size_bytes: metadata.len() as i64,
            chunk_count: chunk_count as i64,
            is_external,
            mtime,
            content_hash: fingerprint(content.as_bytes()),
            indexed_at: now,
            last_indexed_at: now,
        };

        let store_result = self.store.upsert_code_file(&file, &symbols, &detected_patterns);

        match (&embed_result, &store_result) {
            (_, Err(e)) => {
                // Store step failed: delete the vector chunks we just wrote
                // so the two stores don't diverge.
                let _ = self.vectors.delete_code_file(&Collection::Code, collection_prefix, &relative);
                self.record_error(e.to_string());
                return Err(IngestError::Storage(clone_storage_error(e)));
            }
            (Err(e), Ok(_)) => {
                // Vector step failed: degrade to exact-only, store upsert
                // already committed; the file is effectively marked
                // re-embed by virtue of still being absent from the index.
                self.record_error(e.to_string());
            }
            _ => {}
        }

        self.stats.lock().unwrap().indexed_files += 1;
        Ok(IngestOutcome::Indexed { file })
    }

    fn embed_chunks(
        &self,
        file_id: &str,
        project_id: &str,
        language: crate::model::Language,
        symbols: &[String],
        chunks: Vec<(String, ChunkMetadata)>,
    ) -> Result<(), IngestError> {
        if chunks.is_empty() {
            return self.vectors.delete_code_file(&Collection::Code, project_id, file_id).map(|_| ()).map_err(Into::into);
        }

        let texts: Vec<String> = chunks.iter().map(|(text, _)| text.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;

        let mut payload = Vec::with_capacity(chunks.len());
        for ((text, mut meta), vector) in chunks.into_iter().zip(vectors.into_iter()) {
            meta.code_file_id = file_id.to_string();
            meta.language = language;
            meta.symbols = symbols.to_vec();
            payload.push((text, vector, meta));
        }
        self.vectors
            .embed_code_file(&Collection::Code, project_id, file_id, &payload)
            .map_err(Into::into)
    }

    /// `removeFile`: vector chunks first, then the store row, so a crash
    /// mid-removal leaves a recoverable (re-ingestible) state rather than
    /// an orphaned chunk set.
    pub fn remove_file(&self, file_id: &str) -> Result<(), IngestError> {
        self.vectors
            .delete_code_file(&Collection::Code, &self.config.vector_collection_prefix, file_id)?;
        self.store.remove_code_file(file_id, &self.config.project_id)?;
        Ok(())
    }

    /// Walk the project root for indexable files, deduplicate, and ingest
    /// each in turn, yielding cooperatively every 50 files.
    pub async fn index_all(&self, force: bool) -> IngestStats {
        let files = walk_project(&self.config.project_root, &self.config.ignore_globs);
        for (i, path) in files.iter().enumerate() {
            match self.ingest_file(path, force) {
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "ingest failed"),
            }
            if i % 50 == 49 {
                tokio::task::yield_now().await;
            }
        }
        self.stats()
    }
}

fn clone_storage_error(e: &crate::error::StorageError) -> crate::error::StorageError {
    crate::error::StorageError::NotFound(e.to_string())
}

pub fn project_id_of(project_root: &Path) -> String {
    project_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}

fn walk_project(root: &Path, ignore_globs: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
            if language::is_ignored(&relative, ignore_globs) {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

/// Content fingerprint used for change detection between ingest passes.
/// Not cryptographic: `code_files.content_hash` only needs to tell two
/// revisions of a file apart, never to resist forgery.
mod content_hash {
    pub fn fingerprint(bytes: &[u8]) -> String {
        let mut h1: u64 = 0xcbf29ce484222325;
        let mut h2: u64 = 0x84222325cbf29ce4;
        for &b in bytes {
            h1 ^= b as u64;
            h1 = h1.wrapping_mul(0x100000001b3);
            h2 ^= b as u64;
            h2 = h2.wrapping_mul(0x9E3779B97F4A7C15);
        }
        format!("{h1:016x}{h2:016x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicHashEmbedder;
    use std::io::Write;

    fn harness() -> (Ingestor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let config = Config {
            state_dir: state_dir.clone(),
            ..Config::from_env(dir.path().to_path_buf()).unwrap()
        };
        let store = Arc::new(Store::open(config.db_path()).unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(DeterministicHashEmbedder::new(64));
        let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), config.vector_index_dir()));
        (Ingestor::new(store, vectors, embedder, config), dir)
    }

    #[test]
    fn ingests_and_extracts_symbols() {
        let (ingestor, dir) = harness();
        let file_path = dir.path().join("hash.ts");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "export function computeHash(s: string): string {{ return s; }}").unwrap();
        drop(f);

        let outcome = ingestor.ingest_file(&file_path, false).unwrap();
        match outcome {
            IngestOutcome::Indexed { file } => {
                assert_eq!(file.chunk_count, 1);
                let symbols = ingestor.store.get_symbols(&file.id).unwrap();
                assert!(symbols.iter().any(|s| s.name == "computeHash"));
            }
            _ => panic!("expected indexed outcome"),
        }
    }

    #[test]
    fn unchanged_file_is_not_reindexed() {
        let (ingestor, dir) = harness();
        let file_path = dir.path().join("a.py");
        std::fs::write(&file_path, "def f():\n    pass\n").unwrap();

        ingestor.ingest_file(&file_path, false).unwrap();
        let outcome = ingestor.ingest_file(&file_path, false).unwrap();
        assert!(matches!(outcome, IngestOutcome::Unchanged));
    }

    #[test]
    fn zero_byte_file_is_skipped() {
        let (ingestor, dir) = harness();
        let file_path = dir.path().join("empty.txt");
        std::fs::write(&file_path, "").unwrap();
        let outcome = ingestor.ingest_file(&file_path, false).unwrap();
        assert!(matches!(outcome, IngestOutcome::Skipped { reason: "empty" }));
    }

    #[test]
    fn remove_file_deletes_store_row() {
        let (ingestor, dir) = harness();
        let file_path = dir.path().join("a.py");
        std::fs::write(&file_path, "def f():\n    pass\n").unwrap();
        ingestor.ingest_file(&file_path, false).unwrap();

        ingestor.remove_file("a.py").unwrap();
        assert!(ingestor.store.get_code_file("a.py").unwrap().is_none());
    }
}
