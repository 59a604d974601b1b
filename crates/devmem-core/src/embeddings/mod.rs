//! The `Embedder` capability: concrete embedding models are a non-goal of
//! this crate, so callers provide one, and a deterministic default keeps
//! chunking/storage/search exercised without any ML dependency.

use crate::error::EmbedError;

pub trait Embedder: Send + Sync {
    /// Fixed output dimensionality, `D >= 64`.
    fn dimensions(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn warm(&self) -> Result<(), EmbedError> {
        Ok(())
    }
}

/// Stable, seeded bag-of-features hash embedding. Not semantically
/// meaningful, but deterministic for a given text and good enough to
/// exercise the chunking/storage/search pipeline end to end.
pub struct DeterministicHashEmbedder {
    dimensions: usize,
}

impl DeterministicHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(64) }
    }
}

impl Default for DeterministicHashEmbedder {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Embedder for DeterministicHashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimensions)).collect())
    }
}

fn hash_embed(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dimensions];
    for token in text.split_whitespace() {
        let bucket = fnv1a(token.as_bytes()) as usize % dimensions;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
