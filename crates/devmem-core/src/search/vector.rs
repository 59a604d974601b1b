//! Chunked embedding storage, namespaced into per-project collections.
//!
//! Generalizes a single global HNSW index into a map of named collections
//! (`<project>_code`, `<project>_learnings`, `<project>_sessions`), each an
//! independent `usearch::Index` plus the key↔id bookkeeping a `usearch`
//! index needs (it addresses vectors by opaque `u64` keys, so we keep a
//! bidirectional map to the string document IDs callers think in).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::config::{CHUNK_OVERLAP, CHUNK_SIZE};
use crate::error::VectorSearchError;
use crate::model::{ChunkMetadata, Collection};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
}

pub struct QueryHit {
    pub id: String,
    pub distance: f32,
    pub document: String,
    pub metadata: ChunkMetadata,
}

impl QueryHit {
    /// Cosine distance lives in `[0, 2]`; similarity is `1 - distance`
    /// clipped to `[0, 1]`.
    pub fn similarity(&self) -> f32 {
        (1.0 - self.distance).clamp(0.0, 1.0)
    }
}

struct SingleCollection {
    index: Index,
    key_to_id: HashMap<u64, String>,
    id_to_key: HashMap<String, u64>,
    documents: HashMap<String, StoredDocument>,
    next_key: u64,
}

impl SingleCollection {
    fn new(dimensions: usize) -> Result<Self, VectorSearchError> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(|e| VectorSearchError::Index(e.to_string()))?;
        index.reserve(1024).map_err(|e| VectorSearchError::Index(e.to_string()))?;
        Ok(Self {
            index,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            documents: HashMap::new(),
            next_key: 0,
        })
    }

    fn reserve_for(&mut self, additional: usize) -> Result<(), VectorSearchError> {
        let needed = self.index.size() + additional;
        if needed > self.index.capacity() {
            let target = (needed.max(self.index.capacity() * 2)).max(1024);
            self.index
                .reserve(target)
                .map_err(|e| VectorSearchError::Index(e.to_string()))?;
        }
        Ok(())
    }

    fn remove_by_prefix(&mut self, prefix: &str) -> Result<usize, VectorSearchError> {
        let matching: Vec<String> = self
            .id_to_key
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        for id in &matching {
            self.remove(id)?;
        }
        Ok(matching.len())
    }

    fn remove(&mut self, id: &str) -> Result<(), VectorSearchError> {
        if let Some(key) = self.id_to_key.remove(id) {
            self.key_to_id.remove(&key);
            self.documents.remove(id);
            self.index
                .remove(key)
                .map_err(|e| VectorSearchError::Index(e.to_string()))?;
        }
        Ok(())
    }

    fn add(&mut self, id: String, vector: &[f32], document: String, metadata: ChunkMetadata) -> Result<(), VectorSearchError> {
        self.reserve_for(1)?;
        let key = self.next_key;
        self.next_key += 1;
        self.index
            .add(key, vector)
            .map_err(|e| VectorSearchError::Index(e.to_string()))?;
        self.key_to_id.insert(key, id.clone());
        self.id_to_key.insert(id.clone(), key);
        self.documents.insert(id.clone(), StoredDocument { id, document, metadata });
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>, VectorSearchError> {
        let matches = self
            .index
            .search(vector, k)
            .map_err(|e| VectorSearchError::Index(e.to_string()))?;

        let mut hits = Vec::with_capacity(matches.keys.len());
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            if let Some(id) = self.key_to_id.get(key) {
                if let Some(doc) = self.documents.get(id) {
                    hits.push(QueryHit {
                        id: id.clone(),
                        distance: *distance,
                        document: doc.document.clone(),
                        metadata: doc.metadata.clone(),
                    });
                }
            }
        }
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.index.size()
    }
}

pub struct VectorIndexStats {
    pub total_documents: usize,
    pub by_language: HashMap<String, usize>,
}

pub struct VectorIndex {
    collections: Mutex<HashMap<String, SingleCollection>>,
    dimensions: usize,
    persist_dir: PathBuf,
}

impl VectorIndex {
    pub fn new(dimensions: usize, persist_dir: impl Into<PathBuf>) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            dimensions,
            persist_dir: persist_dir.into(),
        }
    }

    fn with_collection<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut SingleCollection) -> Result<R, VectorSearchError>,
    ) -> Result<R, VectorSearchError> {
        let mut collections = self.collections.lock().unwrap();
        if !collections.contains_key(key) {
            collections.insert(key.to_string(), SingleCollection::new(self.dimensions)?);
        }
        f(collections.get_mut(key).unwrap())
    }

    /// Delete any existing chunks for `file_id`, then insert the new chunk
    /// set. Idempotent: re-running with the same content is a no-op beyond
    /// the delete/insert cycle.
    pub fn embed_code_file(
        &self,
        collection: &Collection,
        project_id: &str,
        file_id: &str,
        chunks: &[(String, Vec<f32>, ChunkMetadata)],
    ) -> Result<(), VectorSearchError> {
        let key = collection.key(project_id);
        self.with_collection(&key, |c| {
            c.remove_by_prefix(&format!("{file_id}:chunk:"))?;
            for (content, vector, metadata) in chunks {
                if vector.len() != self.dimensions {
                    return Err(VectorSearchError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    });
                }
                let id = format!("{file_id}:chunk:{}", metadata.chunk_index);
                c.add(id, vector, content.clone(), metadata.clone())?;
            }
            Ok(())
        })
    }

    pub fn delete_code_file(&self, collection: &Collection, project_id: &str, file_id: &str) -> Result<usize, VectorSearchError> {
        let key = collection.key(project_id);
        self.with_collection(&key, |c| c.remove_by_prefix(&format!("{file_id}:chunk:")))
    }

    pub fn embed_learning(
        &self,
        project_id: &str,
        id: &str,
        text: &str,
        vector: &[f32],
        metadata: ChunkMetadata,
    ) -> Result<(), VectorSearchError> {
        if vector.len() != self.dimensions {
            return Err(VectorSearchError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        let key = Collection::Learnings.key(project_id);
        self.with_collection(&key, |c| {
            c.remove(id)?;
            c.add(id.to_string(), vector, text.to_string(), metadata)
        })
    }

    pub fn delete_learning(&self, project_id: &str, id: &str) -> Result<(), VectorSearchError> {
        let key = Collection::Learnings.key(project_id);
        self.with_collection(&key, |c| c.remove(id))
    }

    pub fn query(
        &self,
        collection: &Collection,
        project_id: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, VectorSearchError> {
        let key = collection.key(project_id);
        self.with_collection(&key, |c| c.query(vector, k))
    }

    pub fn stats(&self) -> VectorIndexStats {
        let collections = self.collections.lock().unwrap();
        let mut total = 0;
        let mut by_language: HashMap<String, usize> = HashMap::new();
        for c in collections.values() {
            total += c.len();
            for doc in c.documents.values() {
                *by_language.entry(doc.metadata.language.as_str().to_string()).or_insert(0) += 1;
            }
        }
        VectorIndexStats { total_documents: total, by_language }
    }

    pub fn reset_collections(&self) {
        let mut collections = self.collections.lock().unwrap();
        collections.clear();
    }

    /// Save each collection's index plus a JSON sidecar mapping file, so a
    /// restart can rehydrate the key↔id bookkeeping the HNSW graph alone
    /// cannot reconstruct.
    pub fn save(&self) -> Result<(), VectorSearchError> {
        std::fs::create_dir_all(&self.persist_dir)?;
        let collections = self.collections.lock().unwrap();
        for (key, c) in collections.iter() {
            let index_path = self.index_path(key);
            c.index
                .save(index_path.to_string_lossy().as_ref())
                .map_err(|e| VectorSearchError::Index(e.to_string()))?;

            let sidecar = Sidecar {
                key_to_id: c.key_to_id.clone(),
                documents: c.documents.clone(),
                next_key: c.next_key,
            };
            let sidecar_path = self.sidecar_path(key);
            std::fs::write(sidecar_path, serde_json::to_vec(&sidecar)?)?;
        }
        Ok(())
    }

    pub fn load(&self, key: &str) -> Result<bool, VectorSearchError> {
        let sidecar_path = self.sidecar_path(key);
        if !sidecar_path.exists() {
            return Ok(false);
        }
        let sidecar: Sidecar = serde_json::from_slice(&std::fs::read(sidecar_path)?)?;

        let mut collection = SingleCollection::new(self.dimensions)?;
        collection
            .index
            .load(self.index_path(key).to_string_lossy().as_ref())
            .map_err(|e| VectorSearchError::Index(e.to_string()))?;
        collection.key_to_id = sidecar.key_to_id.clone();
        collection.id_to_key = sidecar.key_to_id.into_iter().map(|(k, v)| (v, k)).collect();
        collection.documents = sidecar.documents;
        collection.next_key = sidecar.next_key;

        self.collections.lock().unwrap().insert(key.to_string(), collection);
        Ok(true)
    }

    fn index_path(&self, key: &str) -> PathBuf {
        self.persist_dir.join(format!("{key}.usearch"))
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        self.persist_dir.join(format!("{key}.json"))
    }
}

#[derive(Serialize, Deserialize)]
struct Sidecar {
    key_to_id: HashMap<u64, String>,
    documents: HashMap<String, StoredDocument>,
    next_key: u64,
}

/// Deterministic text chunker satisfying the external chunking contract:
/// `chunk_count = max(1, ceil((len - overlap) / (size - overlap)))`, with
/// windows `[0, size), [size-overlap, 2*size-overlap), ...` and a possibly
/// shorter final chunk.
pub fn chunk_text(content: &str) -> Vec<(String, ChunkMetadata)> {
    chunk_text_with(content, CHUNK_SIZE, CHUNK_OVERLAP)
}

pub fn chunk_text_with(content: &str, size: usize, overlap: usize) -> Vec<(String, ChunkMetadata)> {
    let bytes = content.as_bytes();
    let len = bytes.len();
    if len == 0 {
        return Vec::new();
    }

    let stride = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let end = (start + size).min(len);
        chunks.push((
            String::from_utf8_lossy(&bytes[start..end]).into_owned(),
            ChunkMetadata {
                code_file_id: String::new(),
                chunk_index: index,
                byte_start: start,
                byte_end: end,
                ..Default::default()
            },
        ));
        if end >= len {
            break;
        }
        start += stride;
        index += 1;
    }

    chunks
}

pub fn expected_chunk_count(len: usize, size: usize, overlap: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let denom = size - overlap;
    (1usize).max((len.saturating_sub(overlap) + denom - 1) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_matches_formula() {
        let content = "x".repeat(925);
        let chunks = chunk_text_with(&content, 300, 50);
        assert_eq!(chunks.len(), expected_chunk_count(925, 300, 50));
        assert_eq!(expected_chunk_count(925, 300, 50), 4);
    }

    #[test]
    fn single_chunk_for_short_content() {
        let chunks = chunk_text_with("hello", 300, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].1.chunk_index, 0);
    }

    #[test]
    fn empty_content_has_no_chunks() {
        assert!(chunk_text_with("", 300, 50).is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let content = "a".repeat(1000);
        let a = chunk_text_with(&content, 300, 50);
        let b = chunk_text_with(&content, 300, 50);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.0, y.0);
            assert_eq!(x.1.byte_start, y.1.byte_start);
            assert_eq!(x.1.byte_end, y.1.byte_end);
        }
    }
}
