pub mod vector;

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock, Mutex};

use lru::LruCache;
use regex::Regex;
use serde::Serialize;

use crate::embeddings::Embedder;
use crate::error::RouterError;
use crate::model::Collection;
use crate::storage::{CodeFileFilter, Store};
use vector::VectorIndex;

const QUERY_EMBED_CACHE_SIZE: usize = 256;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static SHORT_EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.[a-z]{1,4}$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Exact,
    Semantic,
}

/// Classify a query per the external contract: identifier-shaped, path-like,
/// or short-and-few-tokens routes to the store first; anything else is
/// semantic.
pub fn classify(query: &str) -> QueryKind {
    if IDENTIFIER.is_match(query) {
        return QueryKind::Exact;
    }
    if query.contains('/') || SHORT_EXTENSION.is_match(query) {
        return QueryKind::Exact;
    }
    let tokens = query.split_whitespace().count();
    if tokens <= 2 && query.len() < 30 {
        return QueryKind::Exact;
    }
    QueryKind::Semantic
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub file: String,
    pub language: String,
    pub relevance: i64,
    pub preview: String,
    pub source: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub language: Option<String>,
    pub limit: i64,
    pub max_snippets: usize,
}

pub struct QueryRouter {
    store: Arc<Store>,
    vectors: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    project_id: String,
    /// Vector collection namespace; equals `project_id` unless the daemon
    /// was configured with a distinct `DEVMEM_VECTOR_COLLECTION_PREFIX`.
    collection_prefix: String,
    /// Repeated identical queries (a user re-running a search, an agent
    /// polling) skip re-embedding; keyed by the raw query text.
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl QueryRouter {
    pub fn new(store: Arc<Store>, vectors: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, project_id: String) -> Self {
        Self::with_collection_prefix(store, vectors, embedder, project_id.clone(), project_id)
    }

    pub fn with_collection_prefix(
        store: Arc<Store>,
        vectors: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        project_id: String,
        collection_prefix: String,
    ) -> Self {
        Self {
            store,
            vectors,
            embedder,
            project_id,
            collection_prefix,
            query_cache: Mutex::new(LruCache::new(NonZeroUsize::new(QUERY_EMBED_CACHE_SIZE).unwrap())),
        }
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>, RouterError> {
        if let Some(cached) = self.query_cache.lock().unwrap().get(query) {
            return Ok(cached.clone());
        }
        let vector = self.embedder.embed(&[query.to_string()])?.remove(0);
        self.query_cache.lock().unwrap().put(query.to_string(), vector.clone());
        Ok(vector)
    }

    /// Exact first: filename/path, then symbol name. Falls back to semantic
    /// only on a miss (or when the caller explicitly asks for semantic).
    pub fn hybrid_search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>, RouterError> {
        if query.trim().is_empty() {
            return Err(RouterError::EmptyQuery);
        }

        let started = std::time::Instant::now();
        let kind = classify(query);

        let mut results = if kind == QueryKind::Exact {
            self.fast_search(query, opts)?
        } else {
            Vec::new()
        };

        if results.is_empty() {
            results = self.semantic_search(query, opts)?;
        }

        tracing::info!(
            query,
            kind = ?kind,
            result_count = results.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "hybrid_search"
        );

        Ok(results)
    }

    pub fn fast_search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>, RouterError> {
        let limit = if opts.limit > 0 { opts.limit } else { 20 };
        let filter = CodeFileFilter {
            project_id: Some(self.project_id.clone()),
            language: opts.language.as_deref().map(|l| l.parse().unwrap()),
            limit,
            include_external: false,
        };

        let mut path_hits = self.store.find_files(query, &filter)?;
        let mut results: Vec<SearchResult> = path_hits
            .drain(..)
            .map(|f| SearchResult {
                file: f.id,
                language: f.language.as_str().to_string(),
                relevance: 100,
                preview: String::new(),
                source: "sqlite",
            })
            .collect();

        if results.is_empty() {
            let symbol_hits = self.store.find_files_by_symbol(
                query,
                &crate::storage::SymbolFilter { project_id: Some(self.project_id.clone()), limit },
            )?;
            results.extend(symbol_hits.into_iter().map(|f| SearchResult {
                file: f.id,
                language: f.language.as_str().to_string(),
                relevance: 90,
                preview: String::new(),
                source: "sqlite",
            }));
        }

        Ok(results)
    }

    pub fn semantic_search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>, RouterError> {
        let limit = if opts.limit > 0 { opts.limit } else { 20 };
        let max_snippets = if opts.max_snippets > 0 { opts.max_snippets } else { 3 };

        let vector = self.embed_query(query)?;
        let hits = self.vectors.query(&Collection::Code, &self.collection_prefix, &vector, (limit as usize) * 5)?;

        // Aggregate multiple chunk hits per file_id, keeping the best
        // (minimum) distance and up to `max_snippets` previews. The
        // language tag travels with the chunk metadata, so presenting a
        // result never needs a Store round-trip for it.
        use std::collections::HashMap;
        let mut by_file: HashMap<String, (f32, Vec<String>, crate::model::Language)> = HashMap::new();
        for hit in hits {
            let file_id = hit.metadata.code_file_id.clone();
            let entry = by_file.entry(file_id).or_insert((f32::MAX, Vec::new(), hit.metadata.language));
            if hit.distance < entry.0 {
                entry.0 = hit.distance;
            }
            if entry.1.len() < max_snippets {
                entry.1.push(hit.document.chars().take(200).collect());
            }
        }

        let mut results: Vec<SearchResult> = by_file
            .into_iter()
            .filter_map(|(file_id, (min_distance, snippets, language))| {
                // Confirms the file is still live in the store; the language
                // presented comes from the chunk metadata, not this lookup.
                self.store.get_code_file(&file_id).ok().flatten()?;
                let relevance = (100.0 * (1.0 - min_distance.clamp(0.0, 2.0))).round() as i64;
                Some(SearchResult {
                    file: file_id,
                    language: language.as_str().to_string(),
                    relevance,
                    preview: snippets.join(" … "),
                    source: "semantic",
                })
            })
            .collect();

        results.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        results.truncate(limit as usize);
        Ok(results)
    }
}

/// RRF-style linear combination used to merge keyword and semantic scores
/// when both paths contribute results for the same document.
pub fn linear_combination(keyword_score: f64, semantic_score: f64, keyword_weight: f64) -> f64 {
    keyword_weight * keyword_score + (1.0 - keyword_weight) * semantic_score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_identifiers_as_exact() {
        assert_eq!(classify("computeHash"), QueryKind::Exact);
    }

    #[test]
    fn classifies_paths_as_exact() {
        assert_eq!(classify("src/utils/hash.ts"), QueryKind::Exact);
    }

    #[test]
    fn classifies_short_phrases_as_exact() {
        assert_eq!(classify("hash util"), QueryKind::Exact);
    }

    #[test]
    fn classifies_long_phrases_as_semantic() {
        assert_eq!(classify("one-way digest helper for password storage"), QueryKind::Semantic);
    }

    #[test]
    fn linear_combination_weights_correctly() {
        let score = linear_combination(1.0, 0.0, 0.7);
        assert!((score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn repeated_query_hits_the_embed_cache() {
        use crate::embeddings::DeterministicHashEmbedder;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingEmbedder {
            inner: DeterministicHashEmbedder,
            calls: AtomicUsize,
        }
        impl Embedder for CountingEmbedder {
            fn dimensions(&self) -> usize {
                self.inner.dimensions()
            }
            fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::error::EmbedError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.inner.embed(texts)
            }
        }

        let store = Arc::new(Store::open_in_memory().unwrap());
        let embedder = Arc::new(CountingEmbedder { inner: DeterministicHashEmbedder::new(64), calls: AtomicUsize::new(0) });
        let vectors = Arc::new(VectorIndex::new(64, std::env::temp_dir().join("devmem-test-cache")));
        let router = QueryRouter::new(store, vectors, embedder.clone(), "proj".to_string());

        router.embed_query("a caching question about retries").unwrap();
        router.embed_query("a caching question about retries").unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }
}
