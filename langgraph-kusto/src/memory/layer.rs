//! Memory execution engine.
//!
//! Runs one [`MemoryOp`] against the cluster: enrichment with embeddings, the two-phase
//! upsert (look up CreatedAt on the live view, append to the raw table), tombstones,
//! similarity or text search, and namespace listing. No retries; remote faults propagate.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::embedder::Embedder;
use super::json_path::extract_fields;
use super::ops::{
    EmbeddingChunk, MemoryGet, MemoryListNamespaces, MemoryOp, MemoryPut, MemoryResult, MemorySearch,
};
use super::store::{IndexConfig, StoreError};
use crate::client::{row_datetime, row_str, KustoClient, Row};
use crate::clock::Clock;
use crate::kql::{vector_value, IngestRow, KqlBuilder, KqlValue};
use crate::logging::{log_command, log_op, log_query};

fn raw_table(view: &str) -> String {
    format!("{}Raw", view)
}

fn run_query(client: &dyn KustoClient, operation: &str, query: &str) -> Result<Vec<Row>, StoreError> {
    log_query(operation, query);
    Ok(client.execute_query(query)?.into_primary_rows())
}

fn run_command(client: &dyn KustoClient, operation: &str, command: &str) -> Result<(), StoreError> {
    log_command(operation, command);
    client.execute_command(command)?;
    Ok(())
}

async fn arun_query(
    client: &dyn KustoClient,
    operation: &str,
    query: &str,
) -> Result<Vec<Row>, StoreError> {
    log_query(operation, query);
    Ok(client.execute_query_async(query).await?.into_primary_rows())
}

async fn arun_command(client: &dyn KustoClient, operation: &str, command: &str) -> Result<(), StoreError> {
    log_command(operation, command);
    client.execute_command_async(command).await?;
    Ok(())
}

/// Executes memory operations.
///
/// Holds the optional embedder and the clock that stamps CreatedAt/UpdatedAt. Stateless
/// across calls otherwise.
///
/// **Interaction**: Owned by [`KustoStore`](super::KustoStore); ops come from the translator.
pub struct KustoMemoryLayer {
    embedder: Option<Arc<dyn Embedder>>,
    clock: Arc<dyn Clock>,
}

impl KustoMemoryLayer {
    pub fn new(embedder: Option<Arc<dyn Embedder>>, clock: Arc<dyn Clock>) -> Self {
        Self { embedder, clock }
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Fills embedding payloads. Put: one chunk per extracted fragment per index config.
    /// Search: the query vector. No-op without an embedder.
    pub fn enrich(&self, op: &mut MemoryOp) -> Result<(), StoreError> {
        let Some(embedder) = &self.embedder else {
            return Ok(());
        };
        match op {
            MemoryOp::Put(put) => {
                let Some(value) = &put.value else {
                    return Ok(());
                };
                let fragments: Vec<String> = match &put.index {
                    IndexConfig::Disabled => return Ok(()),
                    IndexConfig::Default => vec![value.to_string()],
                    IndexConfig::Paths(paths) => extract_fields(value, paths)?
                        .into_iter()
                        .map(|(_, text)| text)
                        .collect(),
                };
                let mut chunks = Vec::with_capacity(fragments.len());
                let mut model_uri = None;
                for (ordinal, text) in fragments.into_iter().enumerate() {
                    let (vector, model) = embedder.embed(&text)?;
                    model_uri.get_or_insert(model);
                    chunks.push(EmbeddingChunk {
                        ordinal: ordinal as i64,
                        text,
                        vector,
                    });
                }
                put.embedding_chunks = chunks;
                put.embedding_model_uri = model_uri;
            }
            MemoryOp::Search(search) => {
                if let Some(q) = search.query.as_deref().filter(|q| !q.is_empty()) {
                    let (vector, _) = embedder.embed(q)?;
                    search.query_vector = Some(vector);
                }
            }
            MemoryOp::Get(_) | MemoryOp::ListNamespaces(_) => {}
        }
        Ok(())
    }

    /// Enriches and executes `op` synchronously.
    pub fn execute(&self, mut op: MemoryOp, client: &dyn KustoClient) -> Result<MemoryResult, StoreError> {
        log_op(op.kind(), op.namespace());
        self.enrich(&mut op)?;
        match op {
            MemoryOp::Get(get) => self.get(&get, client),
            MemoryOp::Put(put) => self.put(&put, client),
            MemoryOp::Search(search) => self.search(&search, client),
            MemoryOp::ListNamespaces(list) => self.list_namespaces(&list, client),
        }
    }

    /// Asynchronous [`execute`](Self::execute) over the client's async primitives.
    pub async fn aexecute(
        &self,
        mut op: MemoryOp,
        client: &dyn KustoClient,
    ) -> Result<MemoryResult, StoreError> {
        log_op(op.kind(), op.namespace());
        self.enrich(&mut op)?;
        match op {
            MemoryOp::Get(get) => {
                let q = get_query(&get);
                let rows = arun_query(client, "get", &q).await?;
                Ok(MemoryResult::Row(rows.into_iter().next()))
            }
            MemoryOp::Put(put) => {
                let now = self.clock.now();
                let Some(value) = &put.value else {
                    let cmd = tombstone_command(&put, now)?;
                    arun_command(client, "put", &cmd).await?;
                    return Ok(MemoryResult::Written);
                };
                let q = KqlBuilder::memory_get_created_at(&put.table_name, &put.namespace, &put.key);
                let existing = arun_query(client, "put", &q).await?;
                let cmd = record_command(&put, value, created_at_of(&existing).unwrap_or(now), now)?;
                arun_command(client, "put", &cmd).await?;
                if self.has_embedder() {
                    let q = KqlBuilder::memory_embedding_get_created_at(
                        &put.embeddings_table_name,
                        &put.namespace,
                        &put.key,
                    );
                    let prior = prior_chunks(&arun_query(client, "put", &q).await?);
                    if let Some(cmd) = embeddings_command(&put, &prior, now)? {
                        arun_command(client, "put", &cmd).await?;
                    }
                }
                Ok(MemoryResult::Written)
            }
            MemoryOp::Search(search) => {
                let (q, scored) = search_query(&search);
                let rows = arun_query(client, "search", &q).await?;
                Ok(MemoryResult::Rows(page_search(rows, &search, scored)))
            }
            MemoryOp::ListNamespaces(list) => {
                let q = list_query(&list);
                let rows = arun_query(client, "list_namespaces", &q).await?;
                Ok(MemoryResult::Namespaces(page_namespaces(rows, &list)))
            }
        }
    }

    fn get(&self, op: &MemoryGet, client: &dyn KustoClient) -> Result<MemoryResult, StoreError> {
        let rows = run_query(client, "get", &get_query(op))?;
        Ok(MemoryResult::Row(rows.into_iter().next()))
    }

    fn put(&self, op: &MemoryPut, client: &dyn KustoClient) -> Result<MemoryResult, StoreError> {
        let now = self.clock.now();
        let Some(value) = &op.value else {
            run_command(client, "put", &tombstone_command(op, now)?)?;
            return Ok(MemoryResult::Written);
        };

        let q = KqlBuilder::memory_get_created_at(&op.table_name, &op.namespace, &op.key);
        let created_at = created_at_of(&run_query(client, "put", &q)?).unwrap_or(now);
        run_command(client, "put", &record_command(op, value, created_at, now)?)?;

        // Runs even with no new chunks so that fragments the value no longer has are retired.
        if self.has_embedder() {
            let q = KqlBuilder::memory_embedding_get_created_at(
                &op.embeddings_table_name,
                &op.namespace,
                &op.key,
            );
            let prior = prior_chunks(&run_query(client, "put", &q)?);
            if let Some(cmd) = embeddings_command(op, &prior, now)? {
                run_command(client, "put", &cmd)?;
            }
        }
        Ok(MemoryResult::Written)
    }

    fn search(&self, op: &MemorySearch, client: &dyn KustoClient) -> Result<MemoryResult, StoreError> {
        let (q, scored) = search_query(op);
        let rows = run_query(client, "search", &q)?;
        Ok(MemoryResult::Rows(page_search(rows, op, scored)))
    }

    fn list_namespaces(
        &self,
        op: &MemoryListNamespaces,
        client: &dyn KustoClient,
    ) -> Result<MemoryResult, StoreError> {
        let rows = run_query(client, "list_namespaces", &list_query(op))?;
        Ok(MemoryResult::Namespaces(page_namespaces(rows, op)))
    }
}

fn get_query(op: &MemoryGet) -> String {
    KqlBuilder::memory_get_by_key(&op.table_name, &op.namespace, op.namespace_match, &op.key)
}

fn created_at_of(rows: &[Row]) -> Option<DateTime<Utc>> {
    rows.first().and_then(|r| row_datetime(r, "CreatedAt"))
}

/// Ordinal to CreatedAt of live chunks.
fn prior_chunks(rows: &[Row]) -> BTreeMap<i64, DateTime<Utc>> {
    rows.iter()
        .filter_map(|r| {
            let ordinal = r.get("ChunkOrdinal").and_then(Value::as_i64)?;
            Some((ordinal, row_datetime(r, "CreatedAt")?))
        })
        .collect()
}

fn ingest(raw: &str, rows: &[IngestRow]) -> Result<String, StoreError> {
    KqlBuilder::ingest(raw, rows).ok_or_else(|| StoreError::Serialization("no rows to ingest".to_string()))
}

fn tombstone_command(op: &MemoryPut, now: DateTime<Utc>) -> Result<String, StoreError> {
    let row = IngestRow::new()
        .with("Namespace", op.namespace.as_str())
        .with("Key", op.key.as_str())
        .with("Value", KqlValue::Dynamic(json!({})))
        .with("CreatedAt", now)
        .with("UpdatedAt", now)
        .with("Tags", KqlValue::Dynamic(json!({})))
        .with("Deleted", true);
    ingest(&raw_table(&op.table_name), &[row])
}

fn record_command(
    op: &MemoryPut,
    value: &Value,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let row = IngestRow::new()
        .with("Namespace", op.namespace.as_str())
        .with("Key", op.key.as_str())
        .with("Value", KqlValue::Dynamic(value.clone()))
        .with("CreatedAt", created_at)
        .with("UpdatedAt", now)
        .with("Tags", KqlValue::Dynamic(json!({})))
        .with("Deleted", false);
    ingest(&raw_table(&op.table_name), &[row])
}

/// One row per chunk, keeping each ordinal's prior CreatedAt; live ordinals missing from the
/// new chunk list are tombstoned so stale fragments stop matching. `None` when there is
/// nothing to write.
fn embeddings_command(
    op: &MemoryPut,
    prior: &BTreeMap<i64, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<String>, StoreError> {
    let model = op.embedding_model_uri.clone().unwrap_or_default();
    let mut rows: Vec<IngestRow> = op
        .embedding_chunks
        .iter()
        .map(|c| {
            IngestRow::new()
                .with("Namespace", op.namespace.as_str())
                .with("ParentKey", op.key.as_str())
                .with("ChunkOrdinal", c.ordinal)
                .with("ChunkString", c.text.as_str())
                .with("Embedding", KqlValue::Dynamic(vector_value(&c.vector)))
                .with("EmbeddingUri", model.as_str())
                .with("CreatedAt", prior.get(&c.ordinal).copied().unwrap_or(now))
                .with("UpdatedAt", now)
                .with("Deleted", false)
        })
        .collect();
    for (ordinal, created_at) in prior {
        if op.embedding_chunks.iter().any(|c| c.ordinal == *ordinal) {
            continue;
        }
        rows.push(
            IngestRow::new()
                .with("Namespace", op.namespace.as_str())
                .with("ParentKey", op.key.as_str())
                .with("ChunkOrdinal", *ordinal)
                .with("ChunkString", "")
                .with("Embedding", KqlValue::Dynamic(json!([])))
                .with("EmbeddingUri", "")
                .with("CreatedAt", *created_at)
                .with("UpdatedAt", now)
                .with("Deleted", true),
        );
    }
    Ok(KqlBuilder::ingest(&raw_table(&op.embeddings_table_name), &rows))
}

/// Query text and whether it is a scored similarity search.
fn search_query(op: &MemorySearch) -> (String, bool) {
    let take = op.offset + op.limit;
    let query = op.query.as_deref().unwrap_or("");
    match &op.query_vector {
        Some(vector) if !query.is_empty() => (
            KqlBuilder::memory_search_by_similarity(
                &op.table_name,
                &op.embeddings_table_name,
                &op.namespace,
                op.namespace_match,
                vector,
                op.filter.as_ref(),
                take,
            ),
            true,
        ),
        _ => (
            KqlBuilder::memory_search_by_content(
                &op.table_name,
                &op.namespace,
                op.namespace_match,
                query,
                op.filter.as_ref(),
                take,
            ),
            false,
        ),
    }
}

fn score(row: &Row) -> f64 {
    row.get("Score").and_then(Value::as_f64).unwrap_or(f64::NEG_INFINITY)
}

/// Orders scored rows by score descending and applies offset/limit.
fn page_search(mut rows: Vec<Row>, op: &MemorySearch, scored: bool) -> Vec<Row> {
    if scored {
        rows.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
    }
    rows.into_iter().skip(op.offset).take(op.limit).collect()
}

fn list_query(op: &MemoryListNamespaces) -> String {
    KqlBuilder::memory_list_namespaces(
        &op.table_name,
        &op.match_conditions,
        op.max_depth,
        op.offset + op.limit,
    )
}

fn page_namespaces(rows: Vec<Row>, op: &MemoryListNamespaces) -> Vec<String> {
    rows.iter()
        .filter_map(|r| row_str(r, "Namespace"))
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .skip(op.offset)
        .take(op.limit)
        .collect()
}
