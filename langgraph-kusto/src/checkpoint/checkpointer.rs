//! Checkpointer trait and error type.
//!
//! Aligns with LangGraph's `BaseCheckpointSaver`: put / put_writes / get_tuple / list /
//! delete_thread, each with an asynchronous variant.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::config::RunnableConfig;
use super::types::{Checkpoint, CheckpointMetadata, CheckpointTuple, PendingWrite};
use crate::error::KustoError;

/// Error for checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Remote fault, propagated unmodified.
    #[error(transparent)]
    Kusto(#[from] KustoError),
    #[error("thread_id is required")]
    MissingThreadId,
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Stored snapshot or writes have an unexpected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Persists checkpoints per (thread, namespace) and the pending writes against them.
///
/// Not found is `Ok(None)` / an empty list, never an error.
#[async_trait]
pub trait Checkpointer<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    /// Appends `checkpoint`; its parent is `config.checkpoint_id`. Returns a config pointing
    /// at the new checkpoint.
    fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
        metadata: &CheckpointMetadata,
    ) -> Result<RunnableConfig, CheckpointError>;

    /// Records `writes` of `task_id` against `config.checkpoint_id`; no-op without one.
    fn put_writes(
        &self,
        config: &RunnableConfig,
        writes: &[PendingWrite],
        task_id: &str,
    ) -> Result<(), CheckpointError>;

    /// `config.checkpoint_id` when set, else the latest checkpoint of the thread.
    fn get_tuple(&self, config: &RunnableConfig) -> Result<Option<CheckpointTuple<S>>, CheckpointError>;

    /// Checkpoints newest first. No `thread_id` lists every thread. `before` is a checkpoint
    /// id: only checkpoints created strictly earlier are returned. `filter` is equality on
    /// top-level metadata keys.
    fn list(
        &self,
        config: &RunnableConfig,
        filter: Option<&Map<String, Value>>,
        before: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple<S>>, CheckpointError>;

    /// Soft-deletes the thread: later reads ignore every checkpoint created before now.
    fn delete_thread(&self, thread_id: &str) -> Result<(), CheckpointError>;

    async fn aput(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
        metadata: &CheckpointMetadata,
    ) -> Result<RunnableConfig, CheckpointError>;

    async fn aput_writes(
        &self,
        config: &RunnableConfig,
        writes: &[PendingWrite],
        task_id: &str,
    ) -> Result<(), CheckpointError>;

    async fn aget_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<CheckpointTuple<S>>, CheckpointError>;

    async fn alist(
        &self,
        config: &RunnableConfig,
        filter: Option<&Map<String, Value>>,
        before: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple<S>>, CheckpointError>;

    async fn adelete_thread(&self, thread_id: &str) -> Result<(), CheckpointError>;
}
