//! Kusto-backed checkpointer.
//!
//! One raw row per checkpoint (snapshot + metadata in `Snapshot`), one raw row per
//! (checkpoint, task) in the writes table. Thread deletion appends a tombstone; reads only
//! see checkpoints created after a thread's latest tombstone.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::checkpointer::{CheckpointError, Checkpointer};
use super::config::RunnableConfig;
use super::serializer::{bytes_to_stored, stored_to_bytes, Serializer};
use super::types::{Checkpoint, CheckpointMetadata, CheckpointTuple, PendingWrite};
use crate::client::{row_datetime, row_str, schema, KustoClient, Row, TableNames};
use crate::clock::{Clock, MonotonicClock};
use crate::kql::KqlBuilder;
use crate::logging::{log_command, log_query, log_thread_deleted};

/// Checkpoint saver on Kusto.
///
/// Generic over state `S`; state goes through the [`Serializer`]. Checkpoint ids are opaque:
/// "latest" and `before` are decided by CreatedAt, stamped from the clock on `put`.
///
/// **Interaction**: Used as `Arc<dyn Checkpointer<S>>`. Shares the client and table names
/// with [`KustoStore`](crate::memory::KustoStore) when both run against one database.
pub struct KustoCheckpointSaver<S> {
    client: Arc<dyn KustoClient>,
    tables: TableNames,
    serializer: Arc<dyn Serializer<S>>,
    clock: Arc<dyn Clock>,
    setup: bool,
    setup_once: Once,
}

impl<S> KustoCheckpointSaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Default tables, monotonic clock, provisioning on first use.
    pub fn new(client: Arc<dyn KustoClient>, serializer: Arc<dyn Serializer<S>>) -> Self {
        Self {
            client,
            tables: TableNames::default(),
            serializer,
            clock: Arc::new(MonotonicClock::new()),
            setup: true,
            setup_once: Once::new(),
        }
    }

    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Skip provisioning; the tables and views must already exist.
    pub fn without_setup(mut self) -> Self {
        self.setup = false;
        self
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn ensure_setup(&self) {
        if !self.setup {
            return;
        }
        self.setup_once.call_once(|| {
            let report = schema::initialize(self.client.as_ref(), &self.tables);
            if !report.is_complete() {
                tracing::warn!(
                    failed = report.failed.len(),
                    "Checkpoint schema provisioning incomplete"
                );
            }
        });
    }

    fn query(&self, operation: &str, query: &str) -> Result<Vec<Row>, CheckpointError> {
        log_query(operation, query);
        Ok(self.client.execute_query(query)?.into_primary_rows())
    }

    fn command(&self, operation: &str, command: &str) -> Result<(), CheckpointError> {
        log_command(operation, command);
        self.client.execute_command(command)?;
        Ok(())
    }

    async fn aquery(&self, operation: &str, query: &str) -> Result<Vec<Row>, CheckpointError> {
        log_query(operation, query);
        Ok(self.client.execute_query_async(query).await?.into_primary_rows())
    }

    async fn acommand(&self, operation: &str, command: &str) -> Result<(), CheckpointError> {
        log_command(operation, command);
        self.client.execute_command_async(command).await?;
        Ok(())
    }

    fn ingest(&self, raw: &str, row: crate::kql::IngestRow) -> Result<String, CheckpointError> {
        KqlBuilder::ingest(raw, &[row])
            .ok_or_else(|| CheckpointError::Serialization("no rows to ingest".to_string()))
    }

    /// Ingestion command for `checkpoint` and the config that points at it.
    fn put_command(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
        metadata: &CheckpointMetadata,
    ) -> Result<(String, RunnableConfig), CheckpointError> {
        let thread_id = config
            .thread_id
            .as_deref()
            .ok_or(CheckpointError::MissingThreadId)?;
        let created_at = self.clock.now();
        let mut metadata = metadata.clone();
        metadata.created_at.get_or_insert(created_at);

        let channel_values = bytes_to_stored(&self.serializer.serialize(&checkpoint.channel_values)?)?;
        let metadata = serde_json::to_value(&metadata)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let snapshot = json!({
            "checkpoint": {
                "v": 1,
                "id": checkpoint.id,
                "ts": checkpoint.ts,
                "channel_values": channel_values,
                "channel_versions": checkpoint.channel_versions,
            },
            "metadata": metadata,
        });
        let row = KqlBuilder::checkpoint_row(
            thread_id,
            &config.checkpoint_ns,
            &checkpoint.id,
            config.checkpoint_id.as_deref().unwrap_or(""),
            snapshot,
            created_at,
            false,
        );
        let cmd = self.ingest(&self.tables.checkpoints_raw(), row)?;
        let next = RunnableConfig {
            thread_id: Some(thread_id.to_string()),
            checkpoint_id: Some(checkpoint.id.clone()),
            checkpoint_ns: config.checkpoint_ns.clone(),
        };
        Ok((cmd, next))
    }

    /// `None` when there is no checkpoint to attach to or nothing to write.
    fn put_writes_command(
        &self,
        config: &RunnableConfig,
        writes: &[PendingWrite],
        task_id: &str,
    ) -> Result<Option<String>, CheckpointError> {
        let (Some(thread_id), Some(checkpoint_id)) = (&config.thread_id, &config.checkpoint_id) else {
            return Ok(None);
        };
        if writes.is_empty() {
            return Ok(None);
        }
        let pairs: Vec<Value> = writes
            .iter()
            .map(|(channel, value)| json!([channel, value]))
            .collect();
        let row = KqlBuilder::checkpoint_writes_row(
            thread_id,
            &config.checkpoint_ns,
            checkpoint_id,
            task_id,
            Value::Array(pairs),
            self.clock.now(),
        );
        self.ingest(&self.tables.checkpoint_writes_raw(), row).map(Some)
    }

    fn get_query(&self, config: &RunnableConfig) -> Option<String> {
        let thread_id = config.thread_id.as_deref()?;
        let raw = self.tables.checkpoints_raw();
        Some(match &config.checkpoint_id {
            Some(id) => KqlBuilder::checkpoint_get(
                &self.tables.checkpoints,
                &raw,
                thread_id,
                &config.checkpoint_ns,
                id,
            ),
            None => KqlBuilder::checkpoint_latest(&self.tables.checkpoints, &raw, thread_id, &config.checkpoint_ns),
        })
    }

    /// Without a filter the server applies `limit`; with one, filtering and truncation are
    /// done here.
    fn list_query(
        &self,
        config: &RunnableConfig,
        filter: Option<&Map<String, Value>>,
        before: Option<&str>,
        limit: Option<usize>,
    ) -> String {
        let thread_id = config.thread_id.as_deref();
        KqlBuilder::checkpoint_list(
            &self.tables.checkpoints,
            &self.tables.checkpoints_raw(),
            thread_id,
            thread_id.map(|_| config.checkpoint_ns.as_str()),
            before,
            if filter.is_some() { None } else { limit },
        )
    }

    fn writes_query(&self, thread_id: &str, checkpoint_ns: &str, ids: &[String]) -> String {
        KqlBuilder::checkpoint_writes(&self.tables.checkpoint_writes(), thread_id, checkpoint_ns, ids)
    }

    fn decode(&self, row: &Row) -> Result<CheckpointTuple<S>, CheckpointError> {
        decode_checkpoint(row, self.serializer.as_ref())
    }

    fn decode_list(
        &self,
        rows: &[Row],
        filter: Option<&Map<String, Value>>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple<S>>, CheckpointError> {
        let mut out = Vec::new();
        for row in rows {
            let tuple = self.decode(row)?;
            if filter.map_or(true, |f| tuple.metadata.matches(f)) {
                out.push(tuple);
            }
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
        }
        Ok(out)
    }
}

/// Checkpoints grouped by (thread, namespace), with their ids, for writes lookups.
fn write_scopes<S>(tuples: &[CheckpointTuple<S>]) -> BTreeMap<(String, String), Vec<String>> {
    let mut scopes: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for t in tuples {
        let thread = t.config.thread_id.clone().unwrap_or_default();
        scopes
            .entry((thread, t.config.checkpoint_ns.clone()))
            .or_default()
            .push(t.checkpoint.id.clone());
    }
    scopes
}

/// Appends each write row's pairs to its checkpoint in `tuples`, in row order.
fn attach_writes<S>(
    tuples: &mut [CheckpointTuple<S>],
    scope: &(String, String),
    rows: &[Row],
) -> Result<(), CheckpointError> {
    let mut by_id: HashMap<&str, Vec<PendingWrite>> = HashMap::new();
    for row in rows {
        let id = row_str(row, "CheckpointId")
            .ok_or_else(|| CheckpointError::Decode("write row has no CheckpointId".to_string()))?;
        by_id.entry(id).or_default().extend(decode_writes(row.get("Writes"))?);
    }
    for t in tuples.iter_mut() {
        let in_scope = t.config.thread_id.as_deref().unwrap_or_default() == scope.0
            && t.config.checkpoint_ns == scope.1;
        if in_scope {
            if let Some(writes) = by_id.remove(t.checkpoint.id.as_str()) {
                t.pending_writes.extend(writes);
            }
        }
    }
    Ok(())
}

/// Parses a JSON cell that may arrive as text.
fn json_cell(cell: &Value, what: &str) -> Result<Value, CheckpointError> {
    match cell {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| CheckpointError::Decode(format!("{} is not valid JSON: {}", what, e))),
        other => Ok(other.clone()),
    }
}

/// `[[channel, value], ...]` → pairs.
fn decode_writes(cell: Option<&Value>) -> Result<Vec<PendingWrite>, CheckpointError> {
    let Some(cell) = cell else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = json_cell(cell, "Writes")? else {
        return Err(CheckpointError::Decode("Writes is not an array".to_string()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Array(mut pair) if pair.len() == 2 => {
                let value = pair.pop().unwrap_or(Value::Null);
                match pair.pop() {
                    Some(Value::String(channel)) => Ok((channel, value)),
                    _ => Err(CheckpointError::Decode("write channel is not a string".to_string())),
                }
            }
            other => Err(CheckpointError::Decode(format!(
                "write is not a [channel, value] pair: {}",
                other
            ))),
        })
        .collect()
}

fn decode_checkpoint<S>(row: &Row, serializer: &dyn Serializer<S>) -> Result<CheckpointTuple<S>, CheckpointError>
where
    S: Clone + Send + Sync + 'static,
{
    let missing = |col: &str| CheckpointError::Decode(format!("checkpoint row has no {}", col));
    let thread_id = row_str(row, "ThreadId").ok_or_else(|| missing("ThreadId"))?;
    let checkpoint_id = row_str(row, "CheckpointId").ok_or_else(|| missing("CheckpointId"))?;
    let checkpoint_ns = row_str(row, "CheckpointNamespace").unwrap_or_default();
    let parent_id = row_str(row, "ParentCheckpointId").filter(|p| !p.is_empty());

    let snapshot = match row.get("Snapshot") {
        Some(cell @ (Value::String(_) | Value::Object(_))) => json_cell(cell, "Snapshot")?,
        _ => return Err(CheckpointError::Decode("Snapshot is neither text nor an object".to_string())),
    };
    let body = snapshot
        .get("checkpoint")
        .and_then(Value::as_object)
        .ok_or_else(|| CheckpointError::Decode("Snapshot has no checkpoint object".to_string()))?;
    let mut metadata: CheckpointMetadata = snapshot
        .get("metadata")
        .cloned()
        .ok_or_else(|| CheckpointError::Decode("Snapshot has no metadata".to_string()))
        .and_then(|m| serde_json::from_value(m).map_err(|e| CheckpointError::Decode(e.to_string())))?;
    if metadata.created_at.is_none() {
        metadata.created_at = row_datetime(row, "CreatedAt");
    }
    let channel_versions: HashMap<String, u64> = match body.get("channel_versions") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| CheckpointError::Decode(e.to_string()))?,
        None => HashMap::new(),
    };
    let state_bytes = stored_to_bytes(body.get("channel_values").unwrap_or(&Value::Null))?;

    let config = RunnableConfig {
        thread_id: Some(thread_id.to_string()),
        checkpoint_id: Some(checkpoint_id.to_string()),
        checkpoint_ns: checkpoint_ns.to_string(),
    };
    let parent_config = parent_id.map(|p| RunnableConfig {
        checkpoint_id: Some(p.to_string()),
        ..config.clone()
    });
    Ok(CheckpointTuple {
        config,
        checkpoint: Checkpoint {
            id: checkpoint_id.to_string(),
            ts: body.get("ts").and_then(Value::as_str).unwrap_or_default().to_string(),
            channel_values: serializer.deserialize(&state_bytes)?,
            channel_versions,
        },
        metadata,
        parent_config,
        pending_writes: Vec::new(),
    })
}

#[async_trait]
impl<S> Checkpointer<S> for KustoCheckpointSaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
        metadata: &CheckpointMetadata,
    ) -> Result<RunnableConfig, CheckpointError> {
        self.ensure_setup();
        let (cmd, next) = self.put_command(config, checkpoint, metadata)?;
        self.command("checkpoint_put", &cmd)?;
        Ok(next)
    }

    fn put_writes(
        &self,
        config: &RunnableConfig,
        writes: &[PendingWrite],
        task_id: &str,
    ) -> Result<(), CheckpointError> {
        self.ensure_setup();
        match self.put_writes_command(config, writes, task_id)? {
            Some(cmd) => self.command("checkpoint_put_writes", &cmd),
            None => Ok(()),
        }
    }

    fn get_tuple(&self, config: &RunnableConfig) -> Result<Option<CheckpointTuple<S>>, CheckpointError> {
        self.ensure_setup();
        let Some(q) = self.get_query(config) else {
            return Ok(None);
        };
        let rows = self.query("checkpoint_get", &q)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let mut tuples = vec![self.decode(row)?];
        for (scope, ids) in write_scopes(&tuples) {
            let rows = self.query("checkpoint_writes", &self.writes_query(&scope.0, &scope.1, &ids))?;
            attach_writes(&mut tuples, &scope, &rows)?;
        }
        Ok(tuples.pop())
    }

    fn list(
        &self,
        config: &RunnableConfig,
        filter: Option<&Map<String, Value>>,
        before: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple<S>>, CheckpointError> {
        self.ensure_setup();
        let rows = self.query("checkpoint_list", &self.list_query(config, filter, before, limit))?;
        let mut tuples = self.decode_list(&rows, filter, limit)?;
        for (scope, ids) in write_scopes(&tuples) {
            let rows = self.query("checkpoint_writes", &self.writes_query(&scope.0, &scope.1, &ids))?;
            attach_writes(&mut tuples, &scope, &rows)?;
        }
        Ok(tuples)
    }

    fn delete_thread(&self, thread_id: &str) -> Result<(), CheckpointError> {
        self.ensure_setup();
        let row = KqlBuilder::checkpoint_row(thread_id, "", "", "", json!({}), self.clock.now(), true);
        let cmd = self.ingest(&self.tables.checkpoints_raw(), row)?;
        self.command("checkpoint_delete_thread", &cmd)?;
        log_thread_deleted(thread_id);
        Ok(())
    }

    async fn aput(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
        metadata: &CheckpointMetadata,
    ) -> Result<RunnableConfig, CheckpointError> {
        let (cmd, next) = self.put_command(config, checkpoint, metadata)?;
        self.acommand("checkpoint_put", &cmd).await?;
        Ok(next)
    }

    async fn aput_writes(
        &self,
        config: &RunnableConfig,
        writes: &[PendingWrite],
        task_id: &str,
    ) -> Result<(), CheckpointError> {
        match self.put_writes_command(config, writes, task_id)? {
            Some(cmd) => self.acommand("checkpoint_put_writes", &cmd).await,
            None => Ok(()),
        }
    }

    async fn aget_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<CheckpointTuple<S>>, CheckpointError> {
        let Some(q) = self.get_query(config) else {
            return Ok(None);
        };
        let rows = self.aquery("checkpoint_get", &q).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let mut tuples = vec![self.decode(row)?];
        for (scope, ids) in write_scopes(&tuples) {
            let q = self.writes_query(&scope.0, &scope.1, &ids);
            let rows = self.aquery("checkpoint_writes", &q).await?;
            attach_writes(&mut tuples, &scope, &rows)?;
        }
        Ok(tuples.pop())
    }

    async fn alist(
        &self,
        config: &RunnableConfig,
        filter: Option<&Map<String, Value>>,
        before: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple<S>>, CheckpointError> {
        let q = self.list_query(config, filter, before, limit);
        let rows = self.aquery("checkpoint_list", &q).await?;
        let mut tuples = self.decode_list(&rows, filter, limit)?;
        for (scope, ids) in write_scopes(&tuples) {
            let q = self.writes_query(&scope.0, &scope.1, &ids);
            let rows = self.aquery("checkpoint_writes", &q).await?;
            attach_writes(&mut tuples, &scope, &rows)?;
        }
        Ok(tuples)
    }

    async fn adelete_thread(&self, thread_id: &str) -> Result<(), CheckpointError> {
        let row = KqlBuilder::checkpoint_row(thread_id, "", "", "", json!({}), self.clock.now(), true);
        let cmd = self.ingest(&self.tables.checkpoints_raw(), row)?;
        self.acommand("checkpoint_delete_thread", &cmd).await?;
        log_thread_deleted(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointSource, JsonSerializer};
    use crate::client::{KustoResponse, MockKustoClient};
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn saver(mock: Arc<MockKustoClient>) -> KustoCheckpointSaver<Value> {
        KustoCheckpointSaver::new(mock, Arc::new(JsonSerializer))
            .with_clock(Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())))
            .without_setup()
    }

    fn snapshot_row(thread: &str, id: &str, parent: &str, snapshot: Value) -> Row {
        row(json!({
            "ThreadId": thread,
            "CheckpointNamespace": "",
            "CheckpointId": id,
            "ParentCheckpointId": parent,
            "Snapshot": snapshot,
            "CreatedAt": "2024-03-01T12:00:00Z",
        }))
    }

    fn snapshot(state: Value, step: i64) -> Value {
        json!({
            "checkpoint": {"v": 1, "id": "x", "ts": "2024-03-01T12:00:00+00:00",
                           "channel_values": state, "channel_versions": {"messages": 2}},
            "metadata": {"source": "loop", "step": step, "created_at": null, "parents": {}},
        })
    }

    /// **Scenario**: put requires thread_id and sends nothing without it.
    #[test]
    fn put_missing_thread_id() {
        let mock = MockKustoClient::new().into_arc();
        let s = saver(mock.clone());
        let err = s
            .put(
                &RunnableConfig::default(),
                &Checkpoint::from_state(json!({})),
                &CheckpointMetadata::new(CheckpointSource::Input, 0),
            )
            .unwrap_err();
        assert!(matches!(err, CheckpointError::MissingThreadId));
        assert!(mock.commands().is_empty());
    }

    /// **Scenario**: put appends one row with the parent from config and returns the new config.
    #[test]
    fn put_appends_row_with_parent() {
        let mock = MockKustoClient::new().into_arc();
        let s = saver(mock.clone());
        let config = RunnableConfig::for_thread("t1").with_checkpoint_id("c0");
        let next = s
            .put(
                &config,
                &Checkpoint::from_state(json!({"n": 1})).with_id("c1"),
                &CheckpointMetadata::new(CheckpointSource::Loop, 1),
            )
            .unwrap();
        assert_eq!(next, RunnableConfig::for_thread("t1").with_checkpoint_id("c1"));
        let cmds = mock.commands();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].starts_with(
            ".set-or-append LangGraphCheckpointsRaw <| print ThreadId='t1', CheckpointNamespace='', CheckpointId='c1', ParentCheckpointId='c0', Snapshot=dynamic("
        ));
        assert!(cmds[0].contains(r#""channel_values":{"n":1}"#));
        assert!(cmds[0].contains(r#""created_at":"2024-03-01T12:00:00Z""#));
        assert!(cmds[0].ends_with("CreatedAt=datetime(2024-03-01T12:00:00.000000Z), Deleted=false"));
    }

    /// **Scenario**: put_writes without a checkpoint id is a no-op.
    #[test]
    fn put_writes_noop_without_checkpoint_id() {
        let mock = MockKustoClient::new().into_arc();
        let s = saver(mock.clone());
        s.put_writes(
            &RunnableConfig::for_thread("t1"),
            &[("ch".to_string(), json!(1))],
            "task",
        )
        .unwrap();
        assert!(mock.commands().is_empty());
    }

    /// **Scenario**: Writes are stored as [channel, value] pairs.
    #[test]
    fn put_writes_pairs() {
        let mock = MockKustoClient::new().into_arc();
        let s = saver(mock.clone());
        s.put_writes(
            &RunnableConfig::for_thread("t1").with_checkpoint_id("c1"),
            &[("ch1".to_string(), json!("v1")), ("ch2".to_string(), json!("v2"))],
            "t1",
        )
        .unwrap();
        let cmd = &mock.commands()[0];
        assert!(cmd.starts_with(".set-or-append LangGraphCheckpointsWritesRaw <| print ThreadId='t1'"));
        assert!(cmd.contains(r#"Writes=dynamic([["ch1","v1"],["ch2","v2"]])"#));
    }

    /// **Scenario**: Missing thread id or no matching row reads as None.
    #[test]
    fn get_tuple_none() {
        let mock = MockKustoClient::new().into_arc();
        let s = saver(mock.clone());
        assert!(s.get_tuple(&RunnableConfig::default()).unwrap().is_none());
        assert!(mock.queries().is_empty());
        assert!(s.get_tuple(&RunnableConfig::for_thread("t1")).unwrap().is_none());
        assert_eq!(mock.queries().len(), 1);
    }

    /// **Scenario**: get_tuple decodes snapshot text, parent config and writes from several tasks.
    #[test]
    fn get_tuple_decodes_everything() {
        let mock = MockKustoClient::new()
            .with_responder(|q| {
                if q.starts_with("LangGraphCheckpointsWrites()") {
                    Ok(KustoResponse::with_rows(vec![
                        row(json!({"CheckpointId": "c2", "TaskId": "a", "Writes": [["ch1", "v1"]]})),
                        row(json!({"CheckpointId": "c2", "TaskId": "b", "Writes": "[[\"ch2\",\"v2\"]]"})),
                    ]))
                } else {
                    let snap = snapshot(json!({"n": 2}), 2).to_string();
                    Ok(KustoResponse::with_rows(vec![snapshot_row("t1", "c2", "c1", json!(snap))]))
                }
            })
            .into_arc();
        let s = saver(mock.clone());
        let tuple = s
            .get_tuple(&RunnableConfig::for_thread("t1").with_checkpoint_id("c2"))
            .unwrap()
            .unwrap();
        assert_eq!(tuple.checkpoint.id, "c2");
        assert_eq!(tuple.checkpoint.channel_values, json!({"n": 2}));
        assert_eq!(tuple.checkpoint.channel_versions["messages"], 2);
        assert_eq!(tuple.metadata.step, 2);
        assert_eq!(
            tuple.parent_config,
            Some(RunnableConfig::for_thread("t1").with_checkpoint_id("c1"))
        );
        assert_eq!(
            tuple.pending_writes,
            vec![("ch1".to_string(), json!("v1")), ("ch2".to_string(), json!("v2"))]
        );
        assert!(mock.queries()[1].contains("CheckpointId in ('c2')"));
    }

    /// **Scenario**: Metadata without created_at takes the row's CreatedAt; a stored value wins.
    ///
    /// Given: one snapshot with `created_at: null` and one with an explicit timestamp  
    /// When: both are listed  
    /// Then: the first reports the row's CreatedAt, the second keeps its own
    #[test]
    fn metadata_created_at_falls_back_to_row() {
        let mut explicit = snapshot(json!({}), 1);
        explicit["metadata"]["created_at"] = json!("2023-01-01T00:00:00Z");
        let rows = vec![
            snapshot_row("t1", "c2", "c1", snapshot(json!({}), 2)),
            snapshot_row("t1", "c1", "", explicit),
        ];
        let mock = MockKustoClient::new()
            .with_responder(move |q| {
                if q.starts_with("LangGraphCheckpointsWrites()") {
                    return Ok(KustoResponse::empty());
                }
                Ok(KustoResponse::with_rows(rows.clone()))
            })
            .into_arc();
        let got = saver(mock)
            .list(&RunnableConfig::for_thread("t1"), None, None, None)
            .unwrap();
        assert_eq!(
            got[0].metadata.created_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            got[1].metadata.created_at,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
        );
    }

    /// **Scenario**: A snapshot that is neither text nor an object is a decode fault.
    #[test]
    fn get_tuple_bad_snapshot() {
        let mock = MockKustoClient::new()
            .with_rows(vec![snapshot_row("t1", "c1", "", json!(42))])
            .into_arc();
        let err = saver(mock).get_tuple(&RunnableConfig::for_thread("t1")).unwrap_err();
        assert!(matches!(err, CheckpointError::Decode(_)));
    }

    /// **Scenario**: A filter is applied client-side before the limit.
    #[test]
    fn list_filter_then_limit() {
        let mock = MockKustoClient::new()
            .with_responder(|q| {
                if q.starts_with("LangGraphCheckpointsWrites()") {
                    return Ok(KustoResponse::empty());
                }
                Ok(KustoResponse::with_rows(vec![
                    snapshot_row("t1", "c3", "c2", snapshot(json!({}), 3)),
                    snapshot_row("t1", "c2", "c1", snapshot(json!({}), 2)),
                    snapshot_row("t1", "c1", "", snapshot(json!({}), 2)),
                ]))
            })
            .into_arc();
        let s = saver(mock.clone());
        let filter = json!({"step": 2}).as_object().cloned().unwrap();
        let got = s
            .list(&RunnableConfig::for_thread("t1"), Some(&filter), None, Some(1))
            .unwrap();
        let ids: Vec<&str> = got.iter().map(|t| t.checkpoint.id.as_str()).collect();
        assert_eq!(ids, vec!["c2"]);
        assert!(!mock.queries()[0].contains("| take"));
        assert_eq!(mock.queries().len(), 2);
    }

    /// **Scenario**: delete_thread appends one tombstone row with empty namespace and id.
    #[test]
    fn delete_thread_tombstone() {
        let mock = MockKustoClient::new().into_arc();
        saver(mock.clone()).delete_thread("t1").unwrap();
        let cmds = mock.commands();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].contains("ThreadId='t1', CheckpointNamespace='', CheckpointId='', ParentCheckpointId='', Snapshot=dynamic({})"));
        assert!(cmds[0].ends_with("Deleted=true"));
    }

    /// **Scenario**: Async variants fail with NotImplemented from the client.
    #[tokio::test]
    async fn async_variants_not_implemented() {
        let s = saver(MockKustoClient::new().into_arc());
        let err = s.aget_tuple(&RunnableConfig::for_thread("t1")).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Kusto(crate::error::KustoError::NotImplemented(_))));
        assert!(s.adelete_thread("t1").await.is_err());
        assert!(s.aget_tuple(&RunnableConfig::default()).await.unwrap().is_none());
    }
}
