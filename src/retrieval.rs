//! Hybrid retrieval: neighbourhood search re-ranked by recency.
//!
//! Each node's similarity gets a bonus of `recency_boost / age_days`, with
//! age floored at one day. A slightly less similar but much newer memory can
//! therefore outrank an older one. With the default boost of 0.15 the bonus
//! nudges rankings rather than dominating them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::memory::{SearchResult, SqliteMemoryStore};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parameters for [`hybrid_retrieve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Direct similarity hits
    pub top_k: usize,
    /// Rounds of edge expansion
    pub hops: usize,
    /// Bonus for a memory at most one day old
    pub recency_boost: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            hops: 1,
            recency_boost: 0.15,
        }
    }
}

/// Neighbourhood search for `query`, re-ranked with a recency bonus.
pub fn hybrid_retrieve(
    store: &SqliteMemoryStore,
    query: &str,
    config: &HybridConfig,
) -> Result<SearchResult> {
    let mut result = store.search_memory(query, config.top_k, config.hops)?;
    apply_recency_boost(&mut result, config.recency_boost, Utc::now());
    debug!(nodes = result.nodes.len(), "hybrid retrieval complete");
    Ok(result)
}

/// Add `boost / max(1, age_days)` to every node score and re-sort.
pub fn apply_recency_boost(result: &mut SearchResult, boost: f64, now: DateTime<Utc>) {
    for node in &mut result.nodes {
        node.score += boost / age_in_days(node.created_at, now).max(1.0);
    }
    result.sort_nodes();
}

fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age = now - created_at;
    let seconds = match age.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => age.num_seconds() as f64,
    };
    seconds / SECONDS_PER_DAY
}
