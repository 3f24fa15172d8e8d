//! Memory operation model: what the execution engine runs.
//!
//! Namespaces are already joined into their stored string form and every op names the
//! tables it touches. Put and Search carry the embedding payload filled in by enrichment.

use serde_json::{Map, Value};

use super::store::IndexConfig;
use crate::client::Row;
use crate::kql::NamespaceMatch;

/// Point read of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryGet {
    pub namespace: String,
    pub namespace_match: NamespaceMatch,
    pub key: String,
    pub table_name: String,
}

/// One embedded fragment of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingChunk {
    /// Position in the record's chunk list; deterministic for a given index config and shape.
    pub ordinal: i64,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Upsert (`value: Some`) or tombstone (`value: None`).
///
/// Targets the exact namespace: CreatedAt lookups and appends never use prefix matching.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPut {
    pub namespace: String,
    pub key: String,
    pub value: Option<Value>,
    pub table_name: String,
    pub embeddings_table_name: String,
    pub index: IndexConfig,
    /// Filled by enrichment.
    pub embedding_chunks: Vec<EmbeddingChunk>,
    /// Model identifier reported by the embedder for the chunks.
    pub embedding_model_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemorySearch {
    pub namespace: String,
    pub namespace_match: NamespaceMatch,
    pub query: Option<String>,
    pub filter: Option<Map<String, Value>>,
    pub limit: usize,
    pub offset: usize,
    pub table_name: String,
    pub embeddings_table_name: String,
    /// Filled by enrichment when an embedder is configured and a query is present.
    pub query_vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryListNamespaces {
    /// (mode, joined path) pairs; all must hold.
    pub match_conditions: Vec<(NamespaceMatch, String)>,
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
    pub table_name: String,
}

/// Closed set of memory operations.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryOp {
    Get(MemoryGet),
    Put(MemoryPut),
    Search(MemorySearch),
    ListNamespaces(MemoryListNamespaces),
}

impl MemoryOp {
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryOp::Get(_) => "get",
            MemoryOp::Put(_) => "put",
            MemoryOp::Search(_) => "search",
            MemoryOp::ListNamespaces(_) => "list_namespaces",
        }
    }

    /// Stored namespace string the op targets; empty for namespace listing.
    pub fn namespace(&self) -> &str {
        match self {
            MemoryOp::Get(op) => &op.namespace,
            MemoryOp::Put(op) => &op.namespace,
            MemoryOp::Search(op) => &op.namespace,
            MemoryOp::ListNamespaces(_) => "",
        }
    }
}

/// Raw outcome of executing a [`MemoryOp`], before translation.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryResult {
    /// Row of a point read, `None` when not found.
    Row(Option<Row>),
    /// Put completed.
    Written,
    /// Search rows, already ordered and paged.
    Rows(Vec<Row>),
    /// Joined namespace strings, already paged.
    Namespaces(Vec<String>),
}
