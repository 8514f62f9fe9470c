//! Graph-linked memory store.
//!
//! Memories are text nodes with an embedding. Storing a new memory links it
//! to its closest existing neighbours with symmetric `related` edges, so a
//! later search can start from direct similarity hits and walk outward:
//!
//! - **Nodes**: unique text, embedding, timestamp, source, metadata
//! - **Edges**: `related` links weighted by similarity at creation time
//! - **Experiences**: append-only log of orchestration steps
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentic_memory::memory::{NewMemory, SqliteMemoryStore, VectorIndex};
//!
//! # fn main() -> agentic_memory::Result<()> {
//! let store = SqliteMemoryStore::in_memory()?;
//!
//! let id = store.upsert(&NewMemory::new("The API uses JWT for auth").with_source("notes"))?;
//!
//! // Direct hits plus one hop of related memories
//! let result = store.search_memory("JWT auth", 5, 1)?;
//! assert!(result.nodes.iter().any(|n| n.id == id));
//!
//! let hits = store.most_similar(&store.embed("JWT auth")?, 3)?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

#[cfg(test)]
mod proptest;
mod schema;
mod similarity;
mod store;
mod types;

pub use schema::{
    configure_connection, get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION,
};
pub use similarity::{rank_top_k, VectorIndex};
pub use store::{LinkConfig, MemoryStats, SearchConfig, SqliteMemoryStore};
pub(crate) use store::{from_epoch_seconds, to_epoch_seconds};
pub use types::{
    MemoryNode, NewMemory, NodeId, RelationEdge, ScoredNode, SearchResult, SimilarityHit, RELATED,
};
