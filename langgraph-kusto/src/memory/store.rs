//! Generic store model: operations, results and the [`BaseStore`] trait.
//!
//! Mirrors LangGraph's `BaseStore` (GetOp/PutOp/SearchOp/ListNamespacesOp, Item, SearchItem).
//! Backends implement `batch`; the convenience methods are built on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::KustoError;
use crate::kql::NamespaceMatch;

/// Namespace for the store: e.g. `["memories", "user-1"]`.
pub type Namespace = Vec<String>;

/// Builds a [`Namespace`] from string slices.
pub fn namespace(segments: &[&str]) -> Namespace {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Error for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Remote fault, propagated unmodified.
    #[error(transparent)]
    Kusto(#[from] KustoError),
    /// The embedding function failed; the whole write or search fails with it.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// A returned row had a shape that cannot be turned into a result.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    /// An index path could not be parsed.
    #[error("invalid index path: {0}")]
    InvalidIndexPath(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Which parts of a value are embedded on put.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndexConfig {
    /// No chunks, no embedding calls.
    Disabled,
    /// One chunk: the whole serialized value.
    #[default]
    Default,
    /// One chunk per value found at each path (`a.b`, `items[0]`, `items[*].text`), in order.
    Paths(Vec<String>),
}

impl IndexConfig {
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexConfig::Paths(paths.into_iter().map(Into::into).collect())
    }
}

/// Condition for namespace listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCondition {
    pub match_type: NamespaceMatch,
    pub path: Namespace,
}

impl MatchCondition {
    pub fn prefix(path: &[&str]) -> Self {
        Self {
            match_type: NamespaceMatch::Prefix,
            path: namespace(path),
        }
    }

    pub fn suffix(path: &[&str]) -> Self {
        Self {
            match_type: NamespaceMatch::Suffix,
            path: namespace(path),
        }
    }

    /// Whether `ns` satisfies this condition.
    pub fn matches(&self, ns: &[String]) -> bool {
        if self.path.len() > ns.len() {
            return false;
        }
        match self.match_type {
            NamespaceMatch::Prefix => ns[..self.path.len()] == self.path[..],
            NamespaceMatch::Suffix => ns[ns.len() - self.path.len()..] == self.path[..],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetOp {
    pub namespace: Namespace,
    pub key: String,
}

/// Upsert; `value: None` deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct PutOp {
    pub namespace: Namespace,
    pub key: String,
    pub value: Option<Value>,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOp {
    pub namespace_prefix: Namespace,
    /// Equality on top-level value fields.
    pub filter: Option<Map<String, Value>>,
    pub limit: usize,
    pub offset: usize,
    /// Natural-language query; similarity search when an embedder is configured.
    pub query: Option<String>,
}

impl SearchOp {
    /// Defaults: limit 10, offset 0, no query, no filter.
    pub fn new(namespace_prefix: &[&str]) -> Self {
        Self {
            namespace_prefix: namespace(namespace_prefix),
            filter: None,
            limit: 10,
            offset: 0,
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_filter(mut self, filter: Map<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListNamespacesOp {
    pub match_conditions: Vec<MatchCondition>,
    /// Namespaces longer than this are truncated, not dropped.
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListNamespacesOp {
    fn default() -> Self {
        Self {
            match_conditions: Vec::new(),
            max_depth: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl ListNamespacesOp {
    pub fn with_condition(mut self, condition: MatchCondition) -> Self {
        self.match_conditions.push(condition);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// One store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Get(GetOp),
    Put(PutOp),
    Search(SearchOp),
    ListNamespaces(ListNamespacesOp),
}

impl Op {
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Get(_) => "get",
            Op::Put(_) => "put",
            Op::Search(_) => "search",
            Op::ListNamespaces(_) => "list_namespaces",
        }
    }
}

impl From<GetOp> for Op {
    fn from(op: GetOp) -> Self {
        Op::Get(op)
    }
}

impl From<PutOp> for Op {
    fn from(op: PutOp) -> Self {
        Op::Put(op)
    }
}

impl From<SearchOp> for Op {
    fn from(op: SearchOp) -> Self {
        Op::Search(op)
    }
}

impl From<ListNamespacesOp> for Op {
    fn from(op: ListNamespacesOp) -> Self {
        Op::ListNamespaces(op)
    }
}

/// Stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Search hit. `score` is `None` for text search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub score: Option<f64>,
}

/// Result of one [`Op`], same position as the op in the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum OpResult {
    Get(Option<Item>),
    Put,
    Search(Vec<SearchItem>),
    ListNamespaces(Vec<Namespace>),
}

fn unexpected(expected: &str, got: &OpResult) -> StoreError {
    StoreError::Decode(format!("expected {} result, got {:?}", expected, got))
}

/// Long-term memory store.
///
/// `batch` runs ops in order, one round trip each; it stops at the first failing op, whose
/// predecessors stay applied.
#[async_trait]
pub trait BaseStore: Send + Sync {
    fn batch(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, StoreError>;

    /// Asynchronous batch. Backends without an async client fail with the client's
    /// not-implemented fault.
    async fn abatch(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, StoreError>;

    fn get(&self, namespace: &[&str], key: &str) -> Result<Option<Item>, StoreError> {
        let op = GetOp {
            namespace: self::namespace(namespace),
            key: key.to_string(),
        };
        match single(self.batch(vec![op.into()])?)? {
            OpResult::Get(item) => Ok(item),
            other => Err(unexpected("get", &other)),
        }
    }

    /// Upsert with the default index config.
    fn put(&self, namespace: &[&str], key: &str, value: Value) -> Result<(), StoreError> {
        self.put_with_index(namespace, key, value, IndexConfig::Default)
    }

    fn put_with_index(
        &self,
        namespace: &[&str],
        key: &str,
        value: Value,
        index: IndexConfig,
    ) -> Result<(), StoreError> {
        let op = PutOp {
            namespace: self::namespace(namespace),
            key: key.to_string(),
            value: Some(value),
            index,
        };
        self.batch(vec![op.into()]).map(|_| ())
    }

    /// Soft delete: the record disappears from the live view, history stays in the raw log.
    fn delete(&self, namespace: &[&str], key: &str) -> Result<(), StoreError> {
        let op = PutOp {
            namespace: self::namespace(namespace),
            key: key.to_string(),
            value: None,
            index: IndexConfig::Disabled,
        };
        self.batch(vec![op.into()]).map(|_| ())
    }

    fn search(&self, op: SearchOp) -> Result<Vec<SearchItem>, StoreError> {
        match single(self.batch(vec![op.into()])?)? {
            OpResult::Search(items) => Ok(items),
            other => Err(unexpected("search", &other)),
        }
    }

    fn list_namespaces(&self, op: ListNamespacesOp) -> Result<Vec<Namespace>, StoreError> {
        match single(self.batch(vec![op.into()])?)? {
            OpResult::ListNamespaces(ns) => Ok(ns),
            other => Err(unexpected("list_namespaces", &other)),
        }
    }
}

fn single(mut results: Vec<OpResult>) -> Result<OpResult, StoreError> {
    results
        .pop()
        .ok_or_else(|| StoreError::Decode("batch returned no result".to_string()))
}
