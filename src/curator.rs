//! Curation heuristics deciding whether text is new knowledge.
//!
//! Three scores are computed independently:
//!
//! - **utility**: text length over a cap; longer is assumed more informative
//! - **novelty**: one minus the best similarity to an existing memory
//! - **risk**: fixed penalties for URLs and for very short text
//!
//! Text that is both novel and useful enough is *accommodated* (stored as a
//! new memory); everything else is *assimilated* into what is already known.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::memory::{SimilarityHit, SqliteMemoryStore, VectorIndex};

/// Thresholds and penalties for [`curator_check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    /// Nearest memories compared against
    pub neighbours: usize,
    /// Length in characters at which utility saturates
    pub utility_length_cap: usize,
    /// Novelty must exceed this to accommodate
    pub novelty_threshold: f64,
    /// Utility must exceed this to accommodate
    pub utility_threshold: f64,
    /// Risk added when the text contains a URL
    pub url_penalty: f64,
    /// Risk added when the text is shorter than `min_text_length`
    pub short_text_penalty: f64,
    /// Length in characters below which text counts as short
    pub min_text_length: usize,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            neighbours: 5,
            utility_length_cap: 400,
            novelty_threshold: 0.4,
            utility_threshold: 0.3,
            url_penalty: 0.1,
            short_text_penalty: 0.2,
            min_text_length: 20,
        }
    }
}

/// What to do with curated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CuratorDecision {
    /// Meaningfully new; store it
    Accommodate,
    /// Reinforces existing knowledge
    Assimilate,
}

impl std::fmt::Display for CuratorDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accommodate => write!(f, "accommodate"),
            Self::Assimilate => write!(f, "assimilate"),
        }
    }
}

/// Scores and decision for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratorVerdict {
    pub utility: f64,
    pub novelty: f64,
    pub risk: f64,
    /// Nearest stored memories, best first
    pub closest: Vec<SimilarityHit>,
    pub decision: CuratorDecision,
}

/// Score `text` against the store's nearest memories.
pub fn curator_check(
    store: &SqliteMemoryStore,
    text: &str,
    config: &CuratorConfig,
) -> Result<CuratorVerdict> {
    let vector = store.embed(text)?;
    let closest = store.most_similar(&vector, config.neighbours)?;
    let verdict = evaluate(text, closest, config);

    debug!(
        decision = %verdict.decision,
        utility = verdict.utility,
        novelty = verdict.novelty,
        risk = verdict.risk,
        "curator verdict"
    );
    Ok(verdict)
}

/// Score `text` given its nearest neighbours.
pub fn evaluate(text: &str, closest: Vec<SimilarityHit>, config: &CuratorConfig) -> CuratorVerdict {
    let length = text.chars().count();

    let utility = (length as f64 / config.utility_length_cap as f64).clamp(0.0, 1.0);

    // Negative similarities count as unrelated, not as extra novelty
    let best = closest
        .iter()
        .map(|hit| hit.score)
        .fold(0.0_f64, f64::max);
    let novelty = 1.0 - best;

    let mut risk = 0.0;
    if text.contains("http://") || text.contains("https://") {
        risk += config.url_penalty;
    }
    if length < config.min_text_length {
        risk += config.short_text_penalty;
    }

    let decision = if novelty > config.novelty_threshold && utility > config.utility_threshold {
        CuratorDecision::Accommodate
    } else {
        CuratorDecision::Assimilate
    };

    CuratorVerdict {
        utility,
        novelty,
        risk,
        closest,
        decision,
    }
}
