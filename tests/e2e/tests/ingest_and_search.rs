//! End-to-end coverage of the ingest pipeline feeding the hybrid query
//! router, exercised through the public `devmem-core` API against a real
//! (temp-dir) sqlite store and vector index, with no mocks involved.

use std::fs;
use std::sync::Arc;

use devmem_core::config::Config;
use devmem_core::embeddings::DeterministicHashEmbedder;
use devmem_core::search::{QueryRouter, SearchOptions};
use devmem_core::{Ingestor, Store, VectorIndex};

fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    let state_dir = dir.path().join(".devmem-state");
    let config = Config {
        state_dir,
        debounce_ms: 50,
        ..Config::from_env(dir.path().to_path_buf()).unwrap()
    };
    (dir, config)
}

fn harness(files: &[(&str, &str)]) -> (tempfile::TempDir, Ingestor, Arc<QueryRouter>) {
    let (dir, config) = project(files);
    let store = Arc::new(Store::open(config.db_path()).unwrap());
    let embedder: Arc<dyn devmem_core::Embedder> = Arc::new(DeterministicHashEmbedder::default());
    let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), config.vector_index_dir()));
    let project_id = devmem_core::ingest::project_id_of(&config.project_root);

    let ingestor = Ingestor::new(store.clone(), vectors.clone(), embedder.clone(), config);
    let router = Arc::new(QueryRouter::new(store, vectors, embedder, project_id));
    (dir, ingestor, router)
}

#[test]
fn ingests_a_file_and_finds_it_by_path() {
    let (dir, ingestor, router) = harness(&[(
        "src/hash.ts",
        "export function computeHash(input: string): string {\n  return input.length.toString();\n}\n",
    )]);

    let outcome = ingestor
        .ingest_file(&dir.path().join("src/hash.ts"), false)
        .expect("ingest should succeed");
    assert!(matches!(outcome, devmem_core::ingest::IngestOutcome::Indexed { .. }));

    let results = router
        .hybrid_search("src/hash.ts", &SearchOptions::default())
        .expect("search should succeed");
    assert!(results.iter().any(|r| r.file == "src/hash.ts"));
}

#[test]
fn repeated_ingest_without_changes_is_unchanged() {
    let (dir, ingestor, _router) = harness(&[("src/a.py", "def f():\n    return 1\n")]);
    let path = dir.path().join("src/a.py");

    ingestor.ingest_file(&path, false).unwrap();
    let second = ingestor.ingest_file(&path, false).unwrap();
    assert!(matches!(second, devmem_core::ingest::IngestOutcome::Unchanged));
}

#[test]
fn forced_reingest_reindexes_unchanged_content() {
    let (dir, ingestor, _router) = harness(&[("src/a.py", "def f():\n    return 1\n")]);
    let path = dir.path().join("src/a.py");

    ingestor.ingest_file(&path, false).unwrap();
    let forced = ingestor.ingest_file(&path, true).unwrap();
    assert!(matches!(forced, devmem_core::ingest::IngestOutcome::Indexed { .. }));
}

#[test]
fn semantic_search_finds_unrelated_wording_by_meaning() {
    let (dir, ingestor, router) = harness(&[(
        "src/crypto.rs",
        "pub fn one_way_digest(input: &[u8]) -> u64 {\n    // a one-way digest helper for password storage\n    input.iter().map(|b| *b as u64).sum()\n}\n",
    )]);
    ingestor.ingest_file(&dir.path().join("src/crypto.rs"), false).unwrap();

    let results = router
        .hybrid_search("one-way digest helper for password storage", &SearchOptions::default())
        .expect("semantic search should succeed");
    assert!(!results.is_empty());
    assert_eq!(results[0].file, "src/crypto.rs");
}

#[test]
fn removing_a_file_drops_it_from_search_results() {
    let (dir, ingestor, router) = harness(&[("src/gone.go", "package main\n\nfunc Gone() {}\n")]);
    ingestor.ingest_file(&dir.path().join("src/gone.go"), false).unwrap();
    ingestor.remove_file("src/gone.go").unwrap();

    let results = router.hybrid_search("src/gone.go", &SearchOptions::default()).unwrap();
    assert!(!results.iter().any(|r| r.file == "src/gone.go"));
}

#[test]
fn empty_query_is_rejected() {
    let (_dir, _ingestor, router) = harness(&[]);
    let err = router.hybrid_search("   ", &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, devmem_core::error::RouterError::EmptyQuery));
}

#[tokio::test]
async fn index_all_walks_the_project_tree() {
    let (dir, config) = project(&[
        ("src/a.rs", "fn a() {}\n"),
        ("src/b.py", "def b(): pass\n"),
        ("node_modules/dep/index.js", "module.exports = {};\n"),
    ]);
    let store = Arc::new(Store::open(config.db_path()).unwrap());
    let embedder: Arc<dyn devmem_core::Embedder> = Arc::new(DeterministicHashEmbedder::default());
    let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), config.vector_index_dir()));
    let ingestor = Ingestor::new(store.clone(), vectors, embedder, config);

    let stats = ingestor.index_all(false).await;
    assert!(stats.indexed_files >= 2);
    // node_modules is conventionally ignored; it shouldn't be reflected as indexed.
    let project_id = devmem_core::ingest::project_id_of(&dir.path().to_path_buf());
    let found = store.find_files("node_modules", &devmem_core::storage::CodeFileFilter {
        project_id: Some(project_id),
        language: None,
        limit: 10,
        include_external: false,
    });
    assert!(found.unwrap().is_empty());
}
