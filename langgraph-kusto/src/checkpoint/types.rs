//! Checkpoint and metadata types.
//!
//! Aligns with LangGraph checkpoint (id, ts, channel_values, channel_versions) and its
//! metadata (source, step, parents).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::RunnableConfig;

/// Metadata for a single checkpoint.
///
/// Stored alongside the snapshot and returned by `get_tuple` / `list`. Keys not modeled
/// here are kept in `extra` and take part in `list` filters like the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    pub step: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Checkpoint namespace → checkpoint id of parent graphs.
    #[serde(default)]
    pub parents: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CheckpointMetadata {
    pub fn new(source: CheckpointSource, step: i64) -> Self {
        Self {
            source,
            step,
            created_at: None,
            parents: HashMap::new(),
            extra: Map::new(),
        }
    }

    /// Adds a free-form key (builder style).
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// True when every `filter` entry equals the same top-level key of this metadata.
    pub fn matches(&self, filter: &Map<String, Value>) -> bool {
        let Ok(Value::Object(own)) = serde_json::to_value(self) else {
            return false;
        };
        filter.iter().all(|(k, v)| own.get(k) == Some(v))
    }
}

/// Source of the checkpoint (input, loop, update, fork).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    Input,
    Loop,
    Update,
    Fork,
}

/// One checkpoint: state snapshot + channel versions + id/ts.
///
/// Stored keyed by (thread_id, checkpoint_ns, checkpoint_id). `channel_values` is the graph
/// state; it goes through the saver's [`Serializer`](super::Serializer).
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint<S> {
    pub id: String,
    /// ISO-8601 creation time.
    pub ts: String,
    pub channel_values: S,
    pub channel_versions: HashMap<String, u64>,
}

impl<S> Checkpoint<S> {
    /// Creates a checkpoint from current state with a fresh id and the current time.
    pub fn from_state(state: S) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts: Utc::now().to_rfc3339(),
            channel_values: state,
            channel_versions: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// One pending write: (channel, value).
pub type PendingWrite = (String, Value);

/// Checkpoint with everything needed to resume from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple<S> {
    /// Points at this checkpoint.
    pub config: RunnableConfig,
    pub checkpoint: Checkpoint<S>,
    pub metadata: CheckpointMetadata,
    /// Points at the parent checkpoint, when there is one.
    pub parent_config: Option<RunnableConfig>,
    /// Writes of every task against this checkpoint, oldest first.
    pub pending_writes: Vec<PendingWrite>,
}
