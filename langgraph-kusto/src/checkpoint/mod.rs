//! # Checkpoints on Kusto
//!
//! Aligns with LangGraph's checkpointer: per-thread state snapshots keyed by
//! `(thread_id, checkpoint_ns, checkpoint_id)`, each pointing at its parent, plus the
//! pending writes tasks recorded against a checkpoint.
//!
//! ## Config
//!
//! [`RunnableConfig`] selects the thread and, optionally, one checkpoint:
//! - `thread_id`: required to write; a read without it finds nothing.
//! - `checkpoint_id`: load this checkpoint instead of the latest (time travel / branch).
//! - `checkpoint_ns`: namespace for subgraphs, empty for the root graph.
//!
//! ## Implementations
//!
//! | Type                     | Persistence        | Use case                  |
//! |--------------------------|--------------------|---------------------------|
//! | [`KustoCheckpointSaver`] | Kusto raw tables   | Durable, multi-process    |
//!
//! [`JsonSerializer`] covers any `Serialize + DeserializeOwned` state.

mod checkpointer;
mod config;
mod saver;
mod serializer;
mod types;

pub use checkpointer::{CheckpointError, Checkpointer};
pub use config::RunnableConfig;
pub use saver::KustoCheckpointSaver;
pub use serializer::{JsonSerializer, Serializer};
pub use types::{Checkpoint, CheckpointMetadata, CheckpointSource, CheckpointTuple, PendingWrite};
