//! Embedding providers with controllable geometry for tests.

use std::collections::HashMap;

use crate::embedding::{hash_embedding, normalize, EmbeddingProvider};
use crate::error::Result;

/// Hashes the lower-cased, trimmed text, so texts differing only in case or
/// surrounding whitespace embed identically.
pub struct CaseFoldEmbedder;

impl EmbeddingProvider for CaseFoldEmbedder {
    fn dimension(&self) -> usize {
        64
    }

    fn model_name(&self) -> &str {
        "case-fold-hash"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(&text.trim().to_lowercase(), 64))
    }
}

/// Returns fixed vectors for known texts and a 3-d hash vector otherwise.
#[derive(Default)]
pub struct TableEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: [f32; 3]) -> Self {
        self.vectors
            .insert(text.to_string(), normalize(vector.to_vec()));
        self
    }
}

impl EmbeddingProvider for TableEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "table"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| hash_embedding(text, 3)))
    }
}
