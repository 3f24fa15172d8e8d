//! Translation between the generic store model and memory ops.
//!
//! Store ops become [`MemoryOp`]s (namespace joined with `/`, table names filled in, prefix
//! matching), and raw [`MemoryResult`] rows become [`Item`] / [`SearchItem`] values.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::ops::{MemoryGet, MemoryListNamespaces, MemoryOp, MemoryPut, MemoryResult, MemorySearch};
use super::store::{Item, Namespace, Op, OpResult, SearchItem, StoreError};
use crate::client::{row_datetime, row_str, Row, TableNames};
use crate::kql::{NamespaceMatch, NAMESPACE_SEPARATOR};

/// `["a", "b"]` → `"a/b"`.
pub fn namespace_to_str(namespace: &[String]) -> String {
    namespace.join(NAMESPACE_SEPARATOR)
}

/// `"a/b"` → `["a", "b"]`; the empty string is the empty namespace.
pub fn str_to_namespace(s: &str) -> Namespace {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(NAMESPACE_SEPARATOR).map(str::to_string).collect()
}

/// Records need a non-empty namespace whose segments are non-empty and free of the separator.
pub fn validate_namespace(namespace: &[String]) -> Result<(), StoreError> {
    if namespace.is_empty() {
        return Err(StoreError::InvalidNamespace("namespace cannot be empty".to_string()));
    }
    for segment in namespace {
        if segment.is_empty() {
            return Err(StoreError::InvalidNamespace(format!(
                "empty segment in {:?}",
                namespace
            )));
        }
        if segment.contains(NAMESPACE_SEPARATOR) {
            return Err(StoreError::InvalidNamespace(format!(
                "segment {:?} contains '{}'",
                segment, NAMESPACE_SEPARATOR
            )));
        }
    }
    Ok(())
}

/// Store op → memory op against `tables`.
pub fn translate_op(op: &Op, tables: &TableNames) -> Result<MemoryOp, StoreError> {
    Ok(match op {
        Op::Get(get) => MemoryOp::Get(MemoryGet {
            namespace: namespace_to_str(&get.namespace),
            namespace_match: NamespaceMatch::Prefix,
            key: get.key.clone(),
            table_name: tables.store.clone(),
        }),
        Op::Put(put) => {
            validate_namespace(&put.namespace)?;
            MemoryOp::Put(MemoryPut {
                namespace: namespace_to_str(&put.namespace),
                key: put.key.clone(),
                value: put.value.clone(),
                table_name: tables.store.clone(),
                embeddings_table_name: tables.embeddings.clone(),
                index: put.index.clone(),
                embedding_chunks: Vec::new(),
                embedding_model_uri: None,
            })
        }
        Op::Search(search) => MemoryOp::Search(MemorySearch {
            namespace: namespace_to_str(&search.namespace_prefix),
            namespace_match: NamespaceMatch::Prefix,
            query: search.query.clone(),
            filter: search.filter.clone(),
            limit: search.limit,
            offset: search.offset,
            table_name: tables.store.clone(),
            embeddings_table_name: tables.embeddings.clone(),
            query_vector: None,
        }),
        Op::ListNamespaces(list) => MemoryOp::ListNamespaces(MemoryListNamespaces {
            match_conditions: list
                .match_conditions
                .iter()
                .map(|c| (c.match_type, namespace_to_str(&c.path)))
                .collect(),
            max_depth: list.max_depth,
            limit: list.limit,
            offset: list.offset,
            table_name: tables.store.clone(),
        }),
    })
}

/// Raw result of `op` → store result. `now` stands in for missing timestamps.
pub fn translate_result(op: &Op, result: MemoryResult, now: DateTime<Utc>) -> Result<OpResult, StoreError> {
    match (op, result) {
        (Op::Get(get), MemoryResult::Row(row)) => {
            let item = row
                .map(|r| row_to_item(&r, &get.namespace, now))
                .transpose()?;
            Ok(OpResult::Get(item))
        }
        (Op::Put(_), MemoryResult::Written) => Ok(OpResult::Put),
        (Op::Search(search), MemoryResult::Rows(rows)) => {
            let items = rows
                .iter()
                .map(|r| {
                    let item = row_to_item(r, &search.namespace_prefix, now)?;
                    Ok(SearchItem {
                        namespace: item.namespace,
                        key: item.key,
                        value: item.value,
                        created_at: item.created_at,
                        updated_at: item.updated_at,
                        score: r.get("Score").and_then(Value::as_f64),
                    })
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            Ok(OpResult::Search(items))
        }
        (Op::ListNamespaces(list), MemoryResult::Namespaces(joined)) => {
            let mut out: Vec<Namespace> = Vec::new();
            for ns in joined.iter().map(|s| str_to_namespace(s)) {
                let ns = match list.max_depth {
                    Some(0) => break,
                    Some(depth) => ns.into_iter().take(depth).collect(),
                    // Server matching is string based; recheck on whole segments.
                    None if list.match_conditions.iter().all(|c| c.matches(&ns)) => ns,
                    None => continue,
                };
                if !out.contains(&ns) {
                    out.push(ns);
                }
            }
            Ok(OpResult::ListNamespaces(out))
        }
        (op, result) => Err(StoreError::Decode(format!(
            "{} op got mismatched result {:?}",
            op.kind(),
            result
        ))),
    }
}

/// Stored Value: dynamic objects pass through, JSON text is parsed, anything else is wrapped
/// as `{"value": ...}`.
fn decode_value(cell: Option<&Value>) -> Value {
    match cell {
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(v @ Value::Object(_)) => v,
            Ok(other) => json!({ "value": other }),
            Err(_) => json!({ "value": s }),
        },
        Some(Value::Object(o)) => Value::Object(o.clone()),
        Some(Value::Null) | None => json!({}),
        Some(other) => json!({ "value": other }),
    }
}

fn row_to_item(row: &Row, fallback_namespace: &[String], now: DateTime<Utc>) -> Result<Item, StoreError> {
    let key = row_str(row, "Key")
        .ok_or_else(|| StoreError::Decode("row has no Key column".to_string()))?
        .to_string();
    let namespace = match row_str(row, "Namespace") {
        Some(ns) => str_to_namespace(ns),
        None => fallback_namespace.to_vec(),
    };
    Ok(Item {
        namespace,
        key,
        value: decode_value(row.get("Value")),
        created_at: row_datetime(row, "CreatedAt").unwrap_or(now),
        updated_at: row_datetime(row, "UpdatedAt").unwrap_or(now),
    })
}
