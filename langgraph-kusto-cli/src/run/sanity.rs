//! `sanity`: live smoke test of the store and the checkpoint saver.
//!
//! Works in a fresh namespace / thread so it never touches real data, and cleans up after
//! itself with a soft delete and a thread tombstone.

use std::sync::Arc;

use langgraph_kusto::memory::namespace;
use langgraph_kusto::{
    BaseStore, Checkpoint, CheckpointMetadata, CheckpointSource, Checkpointer, JsonSerializer,
    KustoCheckpointSaver, KustoClient, KustoStore, KustoStoreConfig, ListNamespacesOp,
    MatchCondition, RunnableConfig, SearchOp,
};
use serde_json::{json, Value};

use crate::config::{CliConfig, Error};

/// Root segment of every namespace the sanity run writes.
pub const SANITY_ROOT: &str = "langgraph-kusto-sanity";

/// Steps that passed, in order. A failing step aborts the run with an error.
#[derive(Debug, Default)]
pub struct SanityReport {
    pub run_id: String,
    pub passed: Vec<&'static str>,
    pub vector_search: bool,
}

impl SanityReport {
    fn pass(&mut self, step: &'static str) {
        tracing::info!(step, "Sanity step passed");
        self.passed.push(step);
    }
}

fn check(cond: bool, step: &str, detail: impl FnOnce() -> String) -> Result<(), Error> {
    if cond {
        Ok(())
    } else {
        Err(format!("sanity step '{}' failed: {}", step, detail()).into())
    }
}

/// Runs the store and checkpoint round trips against `client`.
pub fn sanity(client: Arc<dyn KustoClient>, config: &CliConfig) -> Result<SanityReport, Error> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut report = SanityReport {
        run_id: run_id.clone(),
        ..Default::default()
    };

    let mut store_config = KustoStoreConfig::default().with_tables(config.tables.clone());
    if let Some(embedder) = config.embedder(client.clone()) {
        store_config = store_config.with_embedder(embedder);
    }
    let store = KustoStore::new(client.clone(), store_config);
    report.vector_search = store.is_vector_enabled();
    store_round_trip(&store, &run_id, &mut report)?;

    let saver: KustoCheckpointSaver<Value> =
        KustoCheckpointSaver::new(client, Arc::new(JsonSerializer)).with_tables(config.tables.clone());
    checkpoint_round_trip(&saver, &run_id, &mut report)?;
    Ok(report)
}

fn store_round_trip(store: &KustoStore, run_id: &str, report: &mut SanityReport) -> Result<(), Error> {
    let ns = [SANITY_ROOT, run_id];
    let value = json!({"text": "kusto sanity check", "run": run_id});

    store.put(&ns, "probe", value.clone())?;
    report.pass("store put");

    let item = store.get(&ns, "probe")?;
    check(item.as_ref().map(|i| &i.value) == Some(&value), "store get", || {
        format!("expected {}, got {:?}", value, item)
    })?;
    report.pass("store get");

    let hits = store.search(SearchOp::new(&ns).with_query("sanity").with_limit(5))?;
    check(hits.iter().any(|h| h.key == "probe"), "store search", || {
        format!("probe not among {} hits", hits.len())
    })?;
    report.pass("store search");

    let listed = store.list_namespaces(
        ListNamespacesOp::default().with_condition(MatchCondition::prefix(&[SANITY_ROOT])),
    )?;
    let expected = namespace(&ns);
    check(listed.contains(&expected), "store list_namespaces", || {
        format!("{:?} not listed", expected)
    })?;
    report.pass("store list_namespaces");

    store.delete(&ns, "probe")?;
    let gone = store.get(&ns, "probe")?;
    check(gone.is_none(), "store delete", || "record still visible after delete".to_string())?;
    report.pass("store delete");
    Ok(())
}

fn checkpoint_round_trip(
    saver: &KustoCheckpointSaver<Value>,
    run_id: &str,
    report: &mut SanityReport,
) -> Result<(), Error> {
    let thread_id = format!("{}-{}", SANITY_ROOT, run_id);
    let checkpoint = Checkpoint::from_state(json!({"messages": ["sanity"]}));

    let config = saver.put(
        &RunnableConfig::for_thread(thread_id.clone()),
        &checkpoint,
        &CheckpointMetadata::new(CheckpointSource::Input, 0),
    )?;
    saver.put_writes(&config, &[("messages".to_string(), json!("pending"))], "sanity-task")?;
    report.pass("checkpoint put");

    let tuple = saver.get_tuple(&config)?;
    check(
        tuple.as_ref().map(|t| t.checkpoint.id.as_str()) == Some(checkpoint.id.as_str()),
        "checkpoint get_tuple",
        || format!("expected checkpoint {}, got {:?}", checkpoint.id, tuple.as_ref().map(|t| &t.checkpoint.id)),
    )?;
    report.pass("checkpoint get_tuple");

    saver.delete_thread(&thread_id)?;
    let after = saver.get_tuple(&RunnableConfig::for_thread(thread_id.clone()))?;
    check(after.is_none(), "checkpoint delete_thread", || {
        "thread still readable after delete".to_string()
    })?;
    report.pass("checkpoint delete_thread");
    Ok(())
}
