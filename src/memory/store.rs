//! SQLite-backed memory store implementation.

use crate::config::MemoryConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider, HashEmbedder};
use crate::error::{Error, Result};
use crate::memory::schema::{configure_connection, initialize_schema};
use crate::memory::similarity::{rank_top_k, VectorIndex};
use crate::memory::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// How a new memory is linked to its closest neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Neighbours considered for linking
    pub top_k: usize,
    /// Minimum cosine similarity for a link
    pub min_score: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.55,
        }
    }
}

/// Defaults for neighbourhood search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Direct similarity hits
    pub top_k: usize,
    /// Rounds of edge expansion
    pub hops: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5, hops: 1 }
    }
}

/// SQLite-backed memory store.
///
/// Owns the `nodes`, `edges` and `experiences` tables. A handle wraps one
/// connection; calls through the same handle are serialized.
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: MemoryConfig,
}

impl SqliteMemoryStore {
    /// Open or create a memory store at the given path with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = MemoryConfig::default().with_db_path(path.as_ref());
        Self::connect(config)
    }

    /// Open the store described by `config`, using hash embeddings.
    pub fn connect(config: MemoryConfig) -> Result<Self> {
        let embedder = Arc::new(HashEmbedder::new(config.embedding_dim));
        let path = config.db_path.clone();
        Self::open_with(path, config, embedder)
    }

    /// Open or create a store at `path` with an explicit embedding provider.
    pub fn open_with(
        path: impl AsRef<Path>,
        config: MemoryConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, config, embedder)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let config = MemoryConfig::default();
        let embedder = Arc::new(HashEmbedder::new(config.embedding_dim));
        Self::in_memory_with(config, embedder)
    }

    /// Create an in-memory store with an explicit embedding provider.
    pub fn in_memory_with(
        config: MemoryConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, config, embedder)
    }

    fn from_connection(
        mut conn: Connection,
        config: MemoryConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        configure_connection(&conn)?;
        initialize_schema(&mut conn)?;
        debug!(
            model = embedder.model_name(),
            dimension = embedder.dimension(),
            "memory store opened"
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedder,
            config,
        })
    }

    /// Configuration this store was opened with.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Embedding provider used for all text.
    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    /// Embed text with the store's provider.
    ///
    /// Fails with [`Error::Embedding`] when the provider returns a vector of
    /// a different size than it advertises.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed(text)?;
        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(Error::Embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.embedder.model_name(),
                vector.len(),
                expected
            )));
        }
        Ok(vector)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&mut conn)
    }

    // ==================== Node Operations ====================

    /// Store `text` unless it is already present, linking it with the
    /// configured defaults.
    pub fn upsert_memory(
        &self,
        text: &str,
        source: Option<&str>,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<NodeId> {
        let memory = NewMemory {
            text: text.to_string(),
            source: source.map(str::to_string),
            metadata: metadata.unwrap_or_default(),
            created_at: None,
        };
        self.upsert(&memory)
    }

    /// Store a memory, linking it with the configured defaults.
    pub fn upsert(&self, memory: &NewMemory) -> Result<NodeId> {
        self.upsert_with_links(memory, &self.config.link)
    }

    /// Store a memory and link it to its closest existing neighbours.
    ///
    /// Identical text returns the existing id and changes nothing. A new node
    /// gets `related` edges in both directions to each of the `link.top_k`
    /// nearest other nodes scoring at least `link.min_score`. The node and
    /// its edges are written in one transaction.
    #[instrument(skip(self, memory, link), fields(text_len = memory.text.len()))]
    pub fn upsert_with_links(&self, memory: &NewMemory, link: &LinkConfig) -> Result<NodeId> {
        if let Some(id) = self.find_by_text(&memory.text)? {
            debug!(node_id = %id, "memory already stored");
            return Ok(id);
        }

        let vector = self.embed(&memory.text)?;
        let embedding_json = serde_json::to_string(&vector)?;
        let meta_json = serde_json::to_string(&memory.metadata)?;
        let ts = to_epoch_seconds(memory.created_at.unwrap_or_else(Utc::now));

        let (id, linked) = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            // Another writer may have stored the same text since the lookup above
            let inserted = tx.execute(
                "INSERT INTO nodes (text, embedding, ts, source, meta)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(text) DO NOTHING",
                params![memory.text, embedding_json, ts, memory.source, meta_json],
            )?;
            if inserted == 0 {
                let existing: i64 = tx.query_row(
                    "SELECT id FROM nodes WHERE text = ?1",
                    params![memory.text],
                    |row| row.get(0),
                )?;
                tx.commit()?;
                return Ok((NodeId(existing), None));
            }

            let id = NodeId(tx.last_insert_rowid());
            let candidates = load_embeddings(&tx, Some(id))?;
            let mut linked = 0usize;
            for hit in rank_top_k(&vector, candidates, link.top_k) {
                if hit.score < link.min_score {
                    continue;
                }
                insert_edge(&tx, id, hit.id, hit.score)?;
                insert_edge(&tx, hit.id, id, hit.score)?;
                linked += 1;
            }

            tx.commit()?;
            Ok((id, Some(linked)))
        })?;

        match linked {
            Some(linked) => info!(node_id = %id, linked, "stored new memory"),
            None => debug!(node_id = %id, "memory stored concurrently, reusing id"),
        }
        Ok(id)
    }

    /// Look up a node id by exact text.
    pub fn find_by_text(&self, text: &str) -> Result<Option<NodeId>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM nodes WHERE text = ?1",
                    params![text],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            Ok(id.map(NodeId))
        })
    }

    /// Get a node by ID.
    pub fn get_node(&self, id: NodeId) -> Result<Option<MemoryNode>> {
        self.with_conn(|conn| fetch_node(conn, id))
    }

    // ==================== Edge Operations ====================

    /// Edges whose source is one of `ids`, ordered by source then destination.
    pub fn edges_from(&self, ids: &[NodeId]) -> Result<Vec<RelationEdge>> {
        let ids: BTreeSet<NodeId> = ids.iter().copied().collect();
        self.with_conn(|conn| fetch_edges_from(conn, &ids))
    }

    // ==================== Search Operations ====================

    /// Neighbourhood search for `query` with the configured defaults.
    pub fn search(&self, query: &str) -> Result<SearchResult> {
        let search = &self.config.search;
        self.search_memory(query, search.top_k, search.hops)
    }

    /// Embed `query` and run a neighbourhood search.
    pub fn search_memory(&self, query: &str, top_k: usize, hops: usize) -> Result<SearchResult> {
        let vector = self.embed(query)?;
        self.search_vector(query, &vector, top_k, hops)
    }

    /// Neighbourhood search around `vector`.
    ///
    /// Takes the `top_k` direct hits, then follows `related` edges for up to
    /// `hops` rounds; each round only expands nodes first reached in the
    /// previous one. Every collected node is scored against `vector`.
    #[instrument(skip(self, vector))]
    pub fn search_vector(
        &self,
        query: &str,
        vector: &[f32],
        top_k: usize,
        hops: usize,
    ) -> Result<SearchResult> {
        let mut result = self.with_conn(|conn| {
            let hits = rank_top_k(vector, load_embeddings(conn, None)?, top_k);

            let mut ids: BTreeSet<NodeId> = hits.iter().map(|hit| hit.id).collect();
            let mut frontier: Vec<NodeId> = ids.iter().copied().collect();

            for _ in 0..hops {
                if frontier.is_empty() {
                    break;
                }
                let mut stmt = conn.prepare_cached(
                    "SELECT dst FROM edges WHERE src = ?1 AND rel = ?2 ORDER BY dst",
                )?;
                let mut next = Vec::new();
                for src in &frontier {
                    let dsts = stmt.query_map(params![src.0, RELATED], |row| row.get::<_, i64>(0))?;
                    for dst in dsts {
                        let dst = NodeId(dst?);
                        if ids.insert(dst) {
                            next.push(dst);
                        }
                    }
                }
                frontier = next;
            }

            let mut nodes = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(node) = fetch_node(conn, *id)? {
                    let score = cosine_similarity(vector, &node.embedding);
                    nodes.push(ScoredNode::from_node(node, score));
                }
            }

            let edges = fetch_edges_from(conn, &ids)?;

            Ok(SearchResult {
                query: query.to_string(),
                hits,
                nodes,
                edges,
            })
        })?;

        result.sort_nodes();
        debug!(
            hits = result.hits.len(),
            nodes = result.nodes.len(),
            edges = result.edges.len(),
            "neighbourhood search complete"
        );
        Ok(result)
    }

    /// Get statistics about the memory store.
    pub fn stats(&self) -> Result<MemoryStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as u64)
            };

            Ok(MemoryStats {
                total_nodes: count("nodes")?,
                total_edges: count("edges")?,
                total_experiences: count("experiences")?,
            })
        })
    }
}

impl VectorIndex for SqliteMemoryStore {
    /// Exhaustive scan over every stored embedding.
    fn most_similar(&self, vector: &[f32], top_k: usize) -> Result<Vec<SimilarityHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| Ok(rank_top_k(vector, load_embeddings(conn, None)?, top_k)))
    }
}

/// Statistics about the memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_nodes: u64,
    pub total_edges: u64,
    pub total_experiences: u64,
}

/// Raw `nodes` row; JSON columns are decoded by [`NodeRow::into_node`].
struct NodeRow {
    id: i64,
    text: String,
    embedding: String,
    ts: f64,
    source: Option<String>,
    meta: Option<String>,
}

impl NodeRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            embedding: row.get(2)?,
            ts: row.get(3)?,
            source: row.get(4)?,
            meta: row.get(5)?,
        })
    }

    fn into_node(self) -> Result<MemoryNode> {
        let embedding: Vec<f32> = serde_json::from_str(&self.embedding)?;
        let metadata = match self.meta.as_deref() {
            None | Some("") => HashMap::new(),
            Some(json) => serde_json::from_str::<Option<HashMap<String, Value>>>(json)?
                .unwrap_or_default(),
        };

        Ok(MemoryNode {
            id: NodeId(self.id),
            text: self.text,
            embedding,
            created_at: from_epoch_seconds(self.ts)?,
            source: self.source,
            metadata,
        })
    }
}

fn fetch_node(conn: &Connection, id: NodeId) -> Result<Option<MemoryNode>> {
    let row = conn
        .query_row(
            "SELECT id, text, embedding, ts, source, meta FROM nodes WHERE id = ?1",
            params![id.0],
            NodeRow::from_row,
        )
        .optional()?;
    row.map(NodeRow::into_node).transpose()
}

/// All stored embeddings in insertion order, optionally skipping one node.
fn load_embeddings(conn: &Connection, exclude: Option<NodeId>) -> Result<Vec<(NodeId, Vec<f32>)>> {
    let mut stmt = conn.prepare_cached("SELECT id, embedding FROM nodes ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .filter(|(id, _)| Some(NodeId(*id)) != exclude)
        .map(|(id, json)| -> Result<(NodeId, Vec<f32>)> {
            Ok((NodeId(id), serde_json::from_str(&json)?))
        })
        .collect()
}

fn insert_edge(conn: &Connection, src: NodeId, dst: NodeId, weight: f64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO edges (src, dst, rel, weight) VALUES (?1, ?2, ?3, ?4)",
        params![src.0, dst.0, RELATED, weight],
    )?;
    Ok(())
}

fn fetch_edges_from(conn: &Connection, ids: &BTreeSet<NodeId>) -> Result<Vec<RelationEdge>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
    let sql = format!(
        "SELECT src, dst, rel, weight FROM edges WHERE src IN ({}) ORDER BY src, dst, rel",
        placeholders.join(",")
    );

    let mut stmt = conn.prepare(&sql)?;
    let edges = stmt
        .query_map(params_from_iter(ids.iter().map(|id| id.0)), |row| {
            Ok(RelationEdge {
                src: NodeId(row.get(0)?),
                dst: NodeId(row.get(1)?),
                rel: row.get(2)?,
                weight: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(edges)
}

/// Seconds since the Unix epoch, with microsecond precision.
pub(crate) fn to_epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

pub(crate) fn from_epoch_seconds(secs: f64) -> Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(Error::storage(format!("invalid timestamp: {}", secs)));
    }
    let micros = (secs * 1_000_000.0).round() as i64;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(micros.div_euclid(1_000_000), nanos)
        .ok_or_else(|| Error::storage(format!("timestamp out of range: {}", secs)))
}
