//! Embedding providers.
//!
//! The store never computes vectors itself; it asks an [`EmbeddingProvider`].
//! [`HashEmbedder`] is a deterministic stand-in derived from a SHA-256 digest
//! of the text. It carries no semantic signal beyond exact text identity, so
//! swap in a real model when similarity between paraphrases matters.

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Default dimensionality of hash embeddings.
pub const DEFAULT_EMBEDDING_DIM: usize = 64;

/// Produces fixed-size vectors for text.
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of the produced vectors.
    fn dimension(&self) -> usize;

    /// Identifier of the model behind this provider.
    fn model_name(&self) -> &str;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic pseudo-embedding built from a SHA-256 digest.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a hash embedder producing vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "sha256-hash"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimension))
    }
}

/// Hash `text` into a unit-length vector of `dimension` floats.
///
/// Digest bytes are repeated until the target size is reached and each byte
/// `b` maps to `(b - 128) / 128`.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());

    let values: Vec<f32> = digest
        .iter()
        .cycle()
        .take(dimension)
        .map(|&b| (f32::from(b) - 128.0) / 128.0)
        .collect();

    normalize(values)
}

/// Scale `values` to unit Euclidean norm. A zero vector is returned as-is.
pub fn normalize(mut values: Vec<f32>) -> Vec<f32> {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut values {
            *v /= norm;
        }
    }
    values
}

/// Cosine similarity of two unit vectors (their dot product).
///
/// Vectors of different lengths are compared over their common prefix.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}
