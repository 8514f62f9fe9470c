//! Core memory types: nodes, edges and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Label of the only relation the store produces.
pub const RELATED: &str = "related";

/// Identifier of a memory node (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored memory. Content is immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// Input for [`SqliteMemoryStore::upsert`](super::SqliteMemoryStore::upsert).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMemory {
    pub text: String,
    pub source: Option<String>,
    pub metadata: HashMap<String, Value>,
    /// Defaults to the time of insertion
    pub created_at: Option<DateTime<Utc>>,
}

impl NewMemory {
    /// Create a new memory from text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A directed, weighted relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub src: NodeId,
    pub dst: NodeId,
    pub rel: String,
    /// Cosine similarity at creation time
    pub weight: f64,
}

/// A node id paired with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub id: NodeId,
    pub score: f64,
}

/// A node returned by a search, scored against the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    pub id: NodeId,
    pub text: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ScoredNode {
    pub(crate) fn from_node(node: MemoryNode, score: f64) -> Self {
        Self {
            id: node.id,
            text: node.text,
            score,
            created_at: node.created_at,
            source: node.source,
            metadata: node.metadata,
        }
    }
}

/// Result of a neighbourhood search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    /// Direct similarity hits, before graph expansion
    pub hits: Vec<SimilarityHit>,
    /// Hits plus expanded neighbours, best first
    pub nodes: Vec<ScoredNode>,
    /// Edges leaving any node in `nodes`
    pub edges: Vec<RelationEdge>,
}

impl SearchResult {
    /// Sort nodes by descending score, ties by ascending id.
    pub fn sort_nodes(&mut self) {
        self.nodes.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_memory_builder() {
        let memory = NewMemory::new("note")
            .with_source("agent.play")
            .with_metadata("kind", "summary")
            .with_metadata("turn", 3);

        assert_eq!(memory.text, "note");
        assert_eq!(memory.source.as_deref(), Some("agent.play"));
        assert_eq!(memory.metadata.get("turn"), Some(&Value::from(3)));
        assert!(memory.created_at.is_none());
    }

    #[test]
    fn test_node_id_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&NodeId(7)).unwrap(), "7");
        assert_eq!(NodeId(7).to_string(), "7");
    }

    #[test]
    fn test_sort_nodes() {
        let node = |id, score| ScoredNode {
            id: NodeId(id),
            text: String::new(),
            score,
            created_at: Utc::now(),
            source: None,
            metadata: HashMap::new(),
        };
        let mut result = SearchResult {
            nodes: vec![node(3, 0.2), node(2, 0.9), node(1, 0.2)],
            ..Default::default()
        };
        result.sort_nodes();

        let ids: Vec<i64> = result.nodes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
