//! # agentic-memory
//!
//! A small SQLite-backed memory and experience store for agentic
//! retrieval-augmented generation.
//!
//! ## Core Components
//!
//! - **Embedding**: pluggable providers; a deterministic SHA-256 stand-in by default
//! - **Memory**: nodes with auto-linked `related` edges and neighbourhood search
//! - **Retrieval**: similarity + graph expansion re-ranked by recency
//! - **Curator**: utility/novelty/risk heuristics deciding what to memorise
//! - **Experience**: step log, keyword self-critique and playbook reuse
//! - **Playbook**: a minimal plan → act → critique → memorise loop
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentic_memory::{hybrid_retrieve, MemoryConfig, NewMemory, SqliteMemoryStore};
//!
//! # fn main() -> agentic_memory::Result<()> {
//! let store = SqliteMemoryStore::connect(MemoryConfig::from_env())?;
//!
//! store.upsert(&NewMemory::new("Ana renews in March").with_source("crm"))?;
//!
//! let result = hybrid_retrieve(&store, "When does Ana renew?", &store.config().hybrid)?;
//! for node in &result.nodes {
//!     println!("{:.2} {}", node.score, node.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod curator;
pub mod embedding;
pub mod error;
pub mod experience;
pub mod memory;
pub mod playbook;
pub mod retrieval;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::MemoryConfig;
pub use curator::{curator_check, CuratorConfig, CuratorDecision, CuratorVerdict};
pub use embedding::{cosine_similarity, EmbeddingProvider, HashEmbedder};
pub use error::{Error, Result};
pub use experience::{
    auto_critique, Critique, ExperienceConfig, ExperienceId, ExperienceRecord, NewExperience,
};
pub use memory::{
    LinkConfig, MemoryNode, MemoryStats, NewMemory, NodeId, RelationEdge, ScoredNode,
    SearchConfig, SearchResult, SimilarityHit, SqliteMemoryStore, VectorIndex,
};
pub use playbook::{ObjectiveRun, PlanStep, Playbook, PlaybookConfig, StepOutcome};
pub use retrieval::{apply_recency_boost, hybrid_retrieve, HybridConfig};
