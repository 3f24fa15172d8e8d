//! # LangGraph memory on Kusto
//!
//! Persistence for LangGraph-style agents on Azure Data Explorer (Kusto): a long-term
//! memory store with optional vector search, and a checkpoint saver for per-thread state.
//!
//! ## Design Principles
//!
//! - **Append-only**: every write is a `.set-or-append` into a raw table. Stored functions
//!   ("live views") keep the newest row per natural key and hide tombstones, so upserts and
//!   deletes never rewrite history.
//! - **KQL as text**: every query is built by [`kql::KqlBuilder`] from encoded literals
//!   ([`kql::encode`]); the client only ships text and returns rows.
//! - **Synchronous first**: all round trips are blocking. The async entry points exist and
//!   fail with [`KustoError::NotImplemented`] unless the client provides async execution.
//!
//! ## Main Modules
//!
//! - [`client`]: `KustoClient` trait, REST client, connection registry, schema provisioning.
//! - [`kql`]: literal encoder and query/command builder.
//! - [`memory`]: `BaseStore`, `KustoStore`, the execution engine and embedders.
//! - [`checkpoint`]: `Checkpointer`, `KustoCheckpointSaver`, checkpoint types.
//! - [`clock`]: write timestamps (`MonotonicClock`, `ManualClock`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use langgraph_kusto::{BaseStore, ClientRegistry, KustoConfig, KustoStore, KustoStoreConfig};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ClientRegistry::new();
//! let client = registry.connect(KustoConfig::from_env()?)?;
//! let store = KustoStore::new(client, KustoStoreConfig::default());
//! store.put(&["users", "u1"], "prefs", json!({"theme": "dark"}))?;
//! let _item = store.get(&["users", "u1"], "prefs")?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod client;
pub mod clock;
pub mod error;
pub mod kql;
pub mod logging;
pub mod memory;

pub use checkpoint::{
    Checkpoint, CheckpointError, CheckpointMetadata, CheckpointSource, CheckpointTuple,
    Checkpointer, JsonSerializer, KustoCheckpointSaver, PendingWrite, RunnableConfig, Serializer,
};
pub use client::{
    ClientRegistry, HttpKustoClient, KustoClient, KustoConfig, KustoResponse, MockKustoClient,
    Row, TableNames,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::KustoError;
pub use memory::{
    BaseStore, Embedder, GetOp, IndexConfig, Item, KustoAiEmbedder, KustoStore, KustoStoreConfig,
    ListNamespacesOp, MatchCondition, Namespace, OpenAiEmbedder, Op, OpResult, PutOp, SearchItem,
    SearchOp, StoreError,
};
