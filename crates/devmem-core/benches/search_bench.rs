//! Benchmarks for the hot paths of ingest and query: chunking, the
//! deterministic embedder, query classification, and RRF-style fusion.
//! Run with: cargo bench -p devmem-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devmem_core::embeddings::{DeterministicHashEmbedder, Embedder};
use devmem_core::search::vector::chunk_text;
use devmem_core::search::{classify, linear_combination};

fn bench_chunk_text(c: &mut Criterion) {
    let content = "fn handler(req: Request) -> Response {\n    todo!()\n}\n".repeat(80);

    c.bench_function("chunk_text_4kb", |b| {
        b.iter(|| black_box(chunk_text(black_box(&content))))
    });
}

fn bench_classify(c: &mut Criterion) {
    let queries = [
        "computeHash",
        "src/utils/hash.ts",
        "hash util",
        "one-way digest helper for password storage",
    ];

    c.bench_function("classify_query", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(classify(q));
            }
        })
    });
}

fn bench_hash_embed(c: &mut Criterion) {
    let embedder = DeterministicHashEmbedder::new(256);
    let text = "a moderately long chunk of source code comments and identifiers to embed".to_string();

    c.bench_function("hash_embed_256d", |b| {
        b.iter(|| black_box(embedder.embed(black_box(&[text.clone()])).unwrap()))
    });
}

fn bench_linear_combination(c: &mut Criterion) {
    c.bench_function("linear_combination", |b| {
        b.iter(|| black_box(linear_combination(black_box(0.8), black_box(0.4), black_box(0.7))))
    });
}

criterion_group!(benches, bench_chunk_text, bench_classify, bench_hash_embed, bench_linear_combination);
criterion_main!(benches);
