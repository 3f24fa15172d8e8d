//! Query and command text for every logical operation.
//!
//! All functions are pure: table names and parameters in, KQL out. Reads go through the
//! live views (stored functions, hence the `()`), writes go to the raw tables.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::literal::{encode, encode_dynamic, encode_string, encode_vector, KqlValue};

/// Separator between namespace segments in the stored `Namespace` column.
pub const NAMESPACE_SEPARATOR: &str = "/";

/// How a requested namespace is compared with stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamespaceMatch {
    /// Stored namespace starts with the requested segments.
    #[default]
    Prefix,
    /// Stored namespace ends with the requested segments.
    Suffix,
}

impl NamespaceMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceMatch::Prefix => "prefix",
            NamespaceMatch::Suffix => "suffix",
        }
    }
}

/// Segment-aware, case-sensitive namespace predicate on `column`.
///
/// Prefix `a/b` matches `a/b` and `a/b/...` but not `a/bc`. `None` for an empty namespace,
/// which matches everything.
pub fn namespace_condition(column: &str, namespace: &str, mode: NamespaceMatch) -> Option<String> {
    if namespace.is_empty() {
        return None;
    }
    let exact = format!("{} == {}", column, encode_string(namespace));
    let partial = match mode {
        NamespaceMatch::Prefix => format!(
            "{} startswith_cs {}",
            column,
            encode_string(&format!("{}{}", namespace, NAMESPACE_SEPARATOR))
        ),
        NamespaceMatch::Suffix => format!(
            "{} endswith_cs {}",
            column,
            encode_string(&format!("{}{}", NAMESPACE_SEPARATOR, namespace))
        ),
    };
    Some(format!("({} or {})", exact, partial))
}

/// Equality predicates on top-level value fields.
fn filter_conditions(filter: Option<&Map<String, Value>>) -> Vec<String> {
    filter
        .map(|f| {
            f.iter()
                .map(|(k, v)| {
                    format!(
                        "tostring(Value[{}]) == tostring({})",
                        encode_string(k),
                        encode_dynamic(v)
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn push_where(lines: &mut Vec<String>, conditions: Vec<String>) {
    if !conditions.is_empty() {
        lines.push(format!("| where {}", conditions.join(" and ")));
    }
}

/// One row of a `.set-or-append` ingestion, columns in table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestRow {
    columns: Vec<(&'static str, KqlValue)>,
}

impl IngestRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column (builder style).
    pub fn with(mut self, column: &'static str, value: impl Into<KqlValue>) -> Self {
        self.columns.push((column, value.into()));
        self
    }

    pub fn columns(&self) -> &[(&'static str, KqlValue)] {
        &self.columns
    }

    /// Value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&KqlValue> {
        self.columns.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    fn to_print(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.encode()))
            .collect();
        format!("print {}", cols.join(", "))
    }
}

/// Builds KQL from primitive parameters.
pub struct KqlBuilder;

impl KqlBuilder {
    /// `.set-or-append <raw> <| print ... | union (print ...)`. `None` for no rows.
    pub fn ingest(raw_table: &str, rows: &[IngestRow]) -> Option<String> {
        let (first, rest) = rows.split_first()?;
        let mut body = first.to_print();
        for row in rest {
            body.push_str(&format!(" | union ({})", row.to_print()));
        }
        Some(format!(".set-or-append {} <| {}", raw_table, body))
    }

    // ---------------------------------------------------------------- memory

    /// Single live row for (namespace match, key); newest first when several namespaces match.
    pub fn memory_get_by_key(
        table: &str,
        namespace: &str,
        mode: NamespaceMatch,
        key: &str,
    ) -> String {
        let mut lines = vec![format!("{}()", table)];
        let mut conds: Vec<String> = namespace_condition("Namespace", namespace, mode)
            .into_iter()
            .collect();
        conds.push(format!("Key == {}", encode_string(key)));
        push_where(&mut lines, conds);
        lines.push("| top 1 by UpdatedAt desc".to_string());
        lines.push("| project Namespace, Key, Value, Tags, CreatedAt, UpdatedAt".to_string());
        lines.join("\n")
    }

    /// CreatedAt of the live row at exactly (namespace, key); empty when absent.
    pub fn memory_get_created_at(table: &str, namespace: &str, key: &str) -> String {
        format!(
            "{}()\n| where Namespace == {} and Key == {}\n| take 1\n| project CreatedAt",
            table,
            encode_string(namespace),
            encode_string(key)
        )
    }

    /// (ChunkOrdinal, CreatedAt) of every live chunk of the record at exactly (namespace, key).
    pub fn memory_embedding_get_created_at(
        embeddings_table: &str,
        namespace: &str,
        parent_key: &str,
    ) -> String {
        format!(
            "{}()\n| where Namespace == {} and ParentKey == {}\n| project ChunkOrdinal, CreatedAt\n| order by ChunkOrdinal asc",
            embeddings_table,
            encode_string(namespace),
            encode_string(parent_key)
        )
    }

    /// Best chunk per record by cosine similarity, joined back to the live record view,
    /// top `take` by score descending.
    pub fn memory_search_by_similarity(
        table: &str,
        embeddings_table: &str,
        namespace: &str,
        mode: NamespaceMatch,
        query_vector: &[f32],
        filter: Option<&Map<String, Value>>,
        take: usize,
    ) -> String {
        let ns = namespace_condition("Namespace", namespace, mode);

        let mut store = vec![format!("{}()", table)];
        let mut store_conds: Vec<String> = ns.iter().cloned().collect();
        store_conds.extend(filter_conditions(filter));
        push_where(&mut store, store_conds);
        store.push(
            "| project StoreNamespace = Namespace, Key, Value, Tags, CreatedAt, UpdatedAt".to_string(),
        );

        let mut lines = vec![
            format!("let q = {};", encode_vector(query_vector)),
            format!("let store = {};", store.join(" ")),
            format!("{}()", embeddings_table),
        ];
        push_where(&mut lines, ns.into_iter().collect());
        lines.push("| extend Score = series_cosine_similarity(Embedding, q)".to_string());
        lines.push("| summarize arg_max(Score, *) by Namespace, ParentKey".to_string());
        lines.push("| project Namespace, ParentKey, ChunkString, ChunkOrdinal, EmbeddingUri, Score".to_string());
        lines.push(
            "| join kind=inner (store) on $left.ParentKey == $right.Key, $left.Namespace == $right.StoreNamespace"
                .to_string(),
        );
        lines.push(
            "| project Namespace, Key, Value, Tags, CreatedAt, UpdatedAt, ChunkString, ChunkOrdinal, EmbeddingUri, Score"
                .to_string(),
        );
        lines.push(format!("| top {} by Score desc", take));
        lines.join("\n")
    }

    /// Substring match on the serialized value, newest first. Empty `query` matches all rows.
    pub fn memory_search_by_content(
        table: &str,
        namespace: &str,
        mode: NamespaceMatch,
        query: &str,
        filter: Option<&Map<String, Value>>,
        take: usize,
    ) -> String {
        let mut lines = vec![format!("{}()", table)];
        let mut conds: Vec<String> = namespace_condition("Namespace", namespace, mode)
            .into_iter()
            .collect();
        if !query.is_empty() {
            conds.push(format!("tostring(Value) contains {}", encode_string(query)));
        }
        conds.extend(filter_conditions(filter));
        push_where(&mut lines, conds);
        lines.push("| order by UpdatedAt desc".to_string());
        lines.push(format!("| take {}", take));
        lines.push("| project Namespace, Key, Value, Tags, CreatedAt, UpdatedAt".to_string());
        lines.join("\n")
    }

    /// Distinct live namespaces matching all `conditions`, truncated to `max_depth` segments,
    /// sorted, first `take`. A `max_depth` of zero matches nothing.
    pub fn memory_list_namespaces(
        table: &str,
        conditions: &[(NamespaceMatch, String)],
        max_depth: Option<usize>,
        take: usize,
    ) -> String {
        let mut lines = vec![format!("{}()", table)];
        push_where(
            &mut lines,
            conditions
                .iter()
                .filter_map(|(mode, path)| namespace_condition("Namespace", path, *mode))
                .collect(),
        );
        lines.push("| distinct Namespace".to_string());
        match max_depth {
            // Zero segments leave nothing to list.
            Some(0) => lines.push("| take 0".to_string()),
            Some(depth) => {
                let sep = encode_string(NAMESPACE_SEPARATOR);
                lines.push(format!(
                    "| project Namespace = strcat_array(array_slice(split(Namespace, {}), 0, {}), {})",
                    sep,
                    depth - 1,
                    sep
                ));
                lines.push("| distinct Namespace".to_string());
            }
            None => {}
        }
        lines.push("| order by Namespace asc".to_string());
        lines.push(format!("| take {}", take));
        lines.join("\n")
    }

    // ------------------------------------------------------------ checkpoints

    /// Scalar holding the latest tombstone of `thread_id` (null when never deleted).
    fn tombstone_let(checkpoints_raw: &str, thread_id: &str) -> String {
        format!(
            "let tombstone = toscalar({} | where ThreadId == {} and Deleted == true | summarize max(CreatedAt));",
            checkpoints_raw,
            encode_string(thread_id)
        )
    }

    /// Exact checkpoint, created after the thread's last tombstone.
    pub fn checkpoint_get(
        checkpoints: &str,
        checkpoints_raw: &str,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> String {
        format!(
            "{}\n{}()\n| where ThreadId == {} and CheckpointNamespace == {} and CheckpointId == {}\n| where isnull(tombstone) or CreatedAt > tombstone\n| take 1",
            Self::tombstone_let(checkpoints_raw, thread_id),
            checkpoints,
            encode_string(thread_id),
            encode_string(checkpoint_ns),
            encode_string(checkpoint_id)
        )
    }

    /// Most recently created checkpoint of (thread, namespace), after the last tombstone.
    pub fn checkpoint_latest(
        checkpoints: &str,
        checkpoints_raw: &str,
        thread_id: &str,
        checkpoint_ns: &str,
    ) -> String {
        format!(
            "{}\n{}()\n| where ThreadId == {} and CheckpointNamespace == {}\n| where isnull(tombstone) or CreatedAt > tombstone\n| top 1 by CreatedAt desc",
            Self::tombstone_let(checkpoints_raw, thread_id),
            checkpoints,
            encode_string(thread_id),
            encode_string(checkpoint_ns)
        )
    }

    /// Checkpoint history newest first.
    ///
    /// `before` is resolved in-query to that checkpoint's CreatedAt; an unknown id applies no
    /// restriction. Tombstones are applied per thread, so listing across threads is safe.
    pub fn checkpoint_list(
        checkpoints: &str,
        checkpoints_raw: &str,
        thread_id: Option<&str>,
        checkpoint_ns: Option<&str>,
        before: Option<&str>,
        take: Option<usize>,
    ) -> String {
        let mut scope: Vec<String> = Vec::new();
        if let Some(t) = thread_id {
            scope.push(format!("ThreadId == {}", encode_string(t)));
        }
        if let Some(ns) = checkpoint_ns {
            scope.push(format!("CheckpointNamespace == {}", encode_string(ns)));
        }

        let mut tombstones = vec![checkpoints_raw.to_string()];
        let mut tomb_conds: Vec<String> = thread_id
            .map(|t| format!("ThreadId == {}", encode_string(t)))
            .into_iter()
            .collect();
        tomb_conds.push("Deleted == true".to_string());
        push_where(&mut tombstones, tomb_conds);
        tombstones.push("| summarize Tombstone = max(CreatedAt) by ThreadId".to_string());

        let mut lines = vec![format!("let tombstones = {};", tombstones.join(" "))];
        if let Some(b) = before {
            let mut lookup = vec![format!("{}()", checkpoints)];
            let mut conds = scope.clone();
            conds.push(format!("CheckpointId == {}", encode_string(b)));
            push_where(&mut lookup, conds);
            lookup.push("| take 1".to_string());
            lookup.push("| project CreatedAt".to_string());
            lines.push(format!("let before_ts = toscalar({});", lookup.join(" ")));
        }
        lines.push(format!("{}()", checkpoints));
        push_where(&mut lines, scope);
        if before.is_some() {
            lines.push("| where isnull(before_ts) or CreatedAt < before_ts".to_string());
        }
        lines.push("| join kind=leftouter (tombstones) on ThreadId".to_string());
        lines.push("| where isnull(Tombstone) or CreatedAt > Tombstone".to_string());
        lines.push("| project-away ThreadId1, Tombstone".to_string());
        lines.push("| order by CreatedAt desc, CheckpointId desc".to_string());
        if let Some(n) = take {
            lines.push(format!("| take {}", n));
        }
        lines.join("\n")
    }

    /// Pending-write rows for the given checkpoints, oldest first.
    pub fn checkpoint_writes(
        writes: &str,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_ids: &[String],
    ) -> String {
        let ids: Vec<String> = checkpoint_ids.iter().map(|id| encode_string(id)).collect();
        format!(
            "{}()\n| where ThreadId == {} and CheckpointNamespace == {} and CheckpointId in ({})\n| order by CreatedAt asc, TaskId asc\n| project CheckpointId, TaskId, Writes, CreatedAt",
            writes,
            encode_string(thread_id),
            encode_string(checkpoint_ns),
            ids.join(", ")
        )
    }

    /// Row appended to the raw checkpoint table.
    #[allow(clippy::too_many_arguments)]
    pub fn checkpoint_row(
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
        parent_checkpoint_id: &str,
        snapshot: Value,
        created_at: DateTime<Utc>,
        deleted: bool,
    ) -> IngestRow {
        IngestRow::new()
            .with("ThreadId", thread_id)
            .with("CheckpointNamespace", checkpoint_ns)
            .with("CheckpointId", checkpoint_id)
            .with("ParentCheckpointId", parent_checkpoint_id)
            .with("Snapshot", KqlValue::Dynamic(snapshot))
            .with("CreatedAt", created_at)
            .with("Deleted", deleted)
    }

    /// Row appended to the raw writes table.
    pub fn checkpoint_writes_row(
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
        task_id: &str,
        writes: Value,
        created_at: DateTime<Utc>,
    ) -> IngestRow {
        IngestRow::new()
            .with("ThreadId", thread_id)
            .with("CheckpointNamespace", checkpoint_ns)
            .with("CheckpointId", checkpoint_id)
            .with("TaskId", task_id)
            .with("Writes", KqlValue::Dynamic(writes))
            .with("CreatedAt", created_at)
    }

    /// `evaluate ai_embeddings` round trip for one text.
    pub fn ai_embeddings(model_uri: &str, text: &str) -> String {
        format!(
            "print text = {}\n| evaluate ai_embeddings(text, {})",
            encode(text),
            encode_string(model_uri)
        )
    }
}
