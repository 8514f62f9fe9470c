//! Property-based tests for embeddings and similarity ranking.
//!
//! These check the invariants retrieval relies on:
//!
//! - Hash embeddings are deterministic and unit-length for any text
//! - Ranking never returns more than `top_k` hits and is sorted best first
//! - A stored vector always finds itself with score 1

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::embedding::{cosine_similarity, hash_embedding};
    use crate::memory::{rank_top_k, NodeId};

    proptest! {
        #[test]
        fn hash_embedding_is_unit_length(text in ".*", dim in 1usize..200) {
            let v = hash_embedding(&text, dim);
            prop_assert_eq!(v.len(), dim);
            let norm: f64 = v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum();
            prop_assert!((norm - 1.0).abs() < 1e-4, "norm {} for {:?}", norm, text);
        }

        #[test]
        fn hash_embedding_is_deterministic(text in ".*") {
            prop_assert_eq!(hash_embedding(&text, 64), hash_embedding(&text, 64));
        }

        #[test]
        fn cosine_is_bounded(a in ".*", b in ".*") {
            let score = cosine_similarity(&hash_embedding(&a, 64), &hash_embedding(&b, 64));
            prop_assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&score));
        }

        #[test]
        fn ranking_is_bounded_and_sorted(
            texts in prop::collection::vec("[a-z ]{1,24}", 0..20),
            query in "[a-z ]{1,24}",
            top_k in 0usize..10
        ) {
            let candidates = texts
                .iter()
                .enumerate()
                .map(|(i, t)| (NodeId(i as i64), hash_embedding(t, 64)));
            let hits = rank_top_k(&hash_embedding(&query, 64), candidates, top_k);

            prop_assert!(hits.len() <= top_k);
            prop_assert!(hits.len() <= texts.len());
            prop_assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }

        #[test]
        fn stored_vector_ranks_itself_first(
            texts in prop::collection::hash_set("[a-z]{1,16}", 1..15),
            pick in any::<prop::sample::Index>()
        ) {
            let texts: Vec<String> = texts.into_iter().collect();
            let target = pick.index(texts.len());
            let candidates = texts
                .iter()
                .enumerate()
                .map(|(i, t)| (NodeId(i as i64), hash_embedding(t, 64)));

            let hits = rank_top_k(&hash_embedding(&texts[target], 64), candidates, 1);

            prop_assert_eq!(hits[0].id, NodeId(target as i64));
            prop_assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }
}
