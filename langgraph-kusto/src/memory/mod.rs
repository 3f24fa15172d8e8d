//! # Memory: Long-term Store on Kusto
//!
//! Aligns with LangGraph's `BaseStore`: batched [`Op`]s (get, put, search, list namespaces)
//! over records isolated by [`Namespace`] (e.g. `["users", "u1", "prefs"]`).
//!
//! ## Layers
//!
//! | Layer          | Type / fn                                 | Role                                        |
//! |----------------|-------------------------------------------|---------------------------------------------|
//! | Store model    | [`BaseStore`], [`Op`], [`Item`]           | Backend-neutral API                          |
//! | Translator     | [`translate_op`], [`translate_result`]    | Namespace joining, table names, row decoding |
//! | Op model       | [`MemoryOp`], [`MemoryResult`]            | What the engine executes                     |
//! | Engine         | [`KustoMemoryLayer`]                      | Enrichment, upsert, search, listing          |
//! | Backend        | [`KustoStore`]                            | `BaseStore` over a [`KustoClient`](crate::client::KustoClient) |
//!
//! ## Embeddings
//!
//! With an [`Embedder`], puts write one embedding chunk per fragment selected by the
//! [`IndexConfig`] (whole value, or values at JSON paths) and searches with a query rank by
//! cosine similarity of the best chunk per record. Without one, search is a substring match
//! on the serialized value.
//!
//! ## Deletion
//!
//! Nothing is ever removed from the raw tables. A delete appends a tombstone row; the live
//! view hides the key until it is written again.

mod embedder;
mod json_path;
mod kusto_store;
mod layer;
mod ops;
mod store;
mod translator;

pub use embedder::{Embedder, KustoAiEmbedder, OpenAiEmbedder};
pub use json_path::{extract_fields, parse_path, traverse, PathToken};
pub use kusto_store::{KustoStore, KustoStoreConfig};
pub use layer::KustoMemoryLayer;
pub use ops::{
    EmbeddingChunk, MemoryGet, MemoryListNamespaces, MemoryOp, MemoryPut, MemoryResult,
    MemorySearch,
};
pub use store::{
    namespace, BaseStore, GetOp, IndexConfig, Item, ListNamespacesOp, MatchCondition, Namespace,
    Op, OpResult, PutOp, SearchItem, SearchOp, StoreError,
};
pub use translator::{
    namespace_to_str, str_to_namespace, translate_op, translate_result, validate_namespace,
};
