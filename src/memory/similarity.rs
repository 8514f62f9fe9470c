//! Nearest-neighbour lookup over stored embeddings.
//!
//! The store answers [`VectorIndex`] queries with an exhaustive scan, which is
//! linear in the number of nodes. That is fine for a few thousand memories;
//! an approximate index can replace it by implementing the same trait.

use crate::embedding::cosine_similarity;
use crate::error::Result;

use super::types::{NodeId, SimilarityHit};

/// Finds the stored vectors closest to a query.
pub trait VectorIndex {
    /// Return at most `top_k` hits, best first.
    fn most_similar(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarityHit>>;
}

/// Score every candidate against `query` and keep the best `top_k`.
///
/// The sort is stable, so equal scores keep candidate order.
pub fn rank_top_k<I>(query: &[f32], candidates: I, top_k: usize) -> Vec<SimilarityHit>
where
    I: IntoIterator<Item = (NodeId, Vec<f32>)>,
{
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<SimilarityHit> = candidates
        .into_iter()
        .map(|(id, vector)| SimilarityHit {
            id,
            score: cosine_similarity(query, &vector),
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    scored
}
