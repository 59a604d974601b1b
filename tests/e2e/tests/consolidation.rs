//! End-to-end coverage of the consolidation engine: two near-duplicate
//! learnings, seeded into both stores exactly as the ingestor would, get
//! merged into a single higher-confidence survivor.

use std::sync::Arc;

use devmem_core::embeddings::DeterministicHashEmbedder;
use devmem_core::model::{ChunkMetadata, Confidence, Visibility};
use devmem_core::{Consolidator, Embedder, Store, VectorIndex};

fn harness(project_id: &str) -> (Consolidator, Arc<Store>, Arc<VectorIndex>, Arc<dyn Embedder>) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let embedder: Arc<dyn Embedder> = Arc::new(DeterministicHashEmbedder::new(64));
    let vectors = Arc::new(VectorIndex::new(embedder.dimensions(), std::env::temp_dir().join(format!("devmem-e2e-{project_id}"))));
    let consolidator = Consolidator::new(store.clone(), vectors.clone(), embedder.clone(), None, project_id.to_string());
    (consolidator, store, vectors, embedder)
}

#[test]
fn merges_two_near_duplicate_learnings_into_one() {
    let (consolidator, store, vectors, embedder) = harness("e2e-consolidate");

    let keep = store
        .create_learning(
            "performance",
            "Use bulk INSERT with BEGIN/COMMIT",
            None,
            None,
            "Batch writes in one transaction",
            None,
            None,
            None,
            Visibility::Private,
            None,
            None,
        )
        .unwrap();
    store.validate_learning(&keep).unwrap();
    store.validate_learning(&keep).unwrap();

    let dup = store
        .create_learning(
            "performance",
            "Bulk insert is much faster",
            None,
            None,
            "Batch writes in one transaction",
            None,
            None,
            None,
            Visibility::Private,
            None,
            None,
        )
        .unwrap();

    let text = "Use bulk INSERT with BEGIN/COMMIT Batch writes in one transaction".to_string();
    let vector = embedder.embed(&[text]).unwrap();
    for id in [&keep, &dup] {
        vectors
            .embed_learning(
                "e2e-consolidate",
                id,
                "seed text",
                &vector[0],
                ChunkMetadata { code_file_id: id.clone(), chunk_index: 0, byte_start: 0, byte_end: 1, ..Default::default() },
            )
            .unwrap();
    }

    let report = consolidator.run(Some("performance"), false).unwrap();
    assert_eq!(report.merged_count, 1);

    assert!(store.get_learning(&dup).is_err(), "duplicate should be gone after merge");
    let survivor = store.get_learning(&keep).unwrap();
    assert!(survivor.confidence >= Confidence::Medium);
}

#[test]
fn dry_run_reports_without_mutating_either_store() {
    let (consolidator, store, vectors, embedder) = harness("e2e-dry-run");

    let keep = store
        .create_learning(
            "testing",
            "Mock the clock in flaky timing tests",
            None,
            None,
            "Inject a fake clock instead of sleeping in tests",
            None,
            None,
            None,
            Visibility::Private,
            None,
            None,
        )
        .unwrap();
    let dup = store
        .create_learning(
            "testing",
            "Flaky timing tests need a fake clock",
            None,
            None,
            "Inject a fake clock instead of sleeping in tests",
            None,
            None,
            None,
            Visibility::Private,
            None,
            None,
        )
        .unwrap();

    let vector = embedder.embed(&["Inject a fake clock instead of sleeping in tests".to_string()]).unwrap();
    for id in [&keep, &dup] {
        vectors
            .embed_learning(
                "e2e-dry-run",
                id,
                "seed text",
                &vector[0],
                ChunkMetadata { code_file_id: id.clone(), chunk_index: 0, byte_start: 0, byte_end: 1, ..Default::default() },
            )
            .unwrap();
    }

    let report = consolidator.run(Some("testing"), true).unwrap();
    assert_eq!(report.groups_considered, 1);
    assert_eq!(report.merged_count, 0, "dry run must not merge");

    assert!(store.get_learning(&keep).is_ok());
    assert!(store.get_learning(&dup).is_ok(), "dry run must not delete the duplicate");
}

#[test]
fn unrelated_learnings_are_left_alone() {
    let (consolidator, store, vectors, embedder) = harness("e2e-unrelated");

    let a = store
        .create_learning(
            "testing",
            "Always seed RNGs in property tests",
            None,
            None,
            "Deterministic seeds make failures reproducible",
            None,
            None,
            None,
            Visibility::Private,
            None,
            None,
        )
        .unwrap();
    let b = store
        .create_learning(
            "deployment",
            "Roll out behind a feature flag",
            None,
            None,
            "Feature flags let you revert without a redeploy",
            None,
            None,
            None,
            Visibility::Private,
            None,
            None,
        )
        .unwrap();

    for (id, text) in [
        (&a, "Deterministic seeds make failures reproducible"),
        (&b, "Feature flags let you revert without a redeploy"),
    ] {
        let vector = embedder.embed(&[text.to_string()]).unwrap();
        vectors
            .embed_learning(
                "e2e-unrelated",
                id,
                text,
                &vector[0],
                ChunkMetadata { code_file_id: id.clone(), chunk_index: 0, byte_start: 0, byte_end: text.len(), ..Default::default() },
            )
            .unwrap();
    }

    let report = consolidator.run(None, false).unwrap();
    assert_eq!(report.merged_count, 0);
    assert!(store.get_learning(&a).is_ok());
    assert!(store.get_learning(&b).is_ok());
}
