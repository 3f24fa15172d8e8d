//! Integration tests for KustoCheckpointSaver.
//!
//! Rows written by `put` / `put_writes` are read back out of the recorded ingestion commands
//! and served as the views would serve them, so the round trip covers encoding and decoding.

use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use langgraph_kusto::client::KustoResponse;
use langgraph_kusto::{
    Checkpoint, CheckpointError, CheckpointMetadata, CheckpointSource, Checkpointer, JsonSerializer,
    KustoCheckpointSaver, ManualClock, MockKustoClient, Row, RunnableConfig,
};
use serde_json::{json, Value};

/// Value of `column=<literal>` in a `print` ingestion command.
fn literal(cmd: &str, column: &str) -> Value {
    let marker = format!("{}=", column);
    let start = cmd.find(&marker).unwrap() + marker.len();
    let rest = &cmd[start..];
    if let Some(body) = rest.strip_prefix("dynamic(") {
        return serde_json::Deserializer::from_str(body)
            .into_iter::<Value>()
            .next()
            .unwrap()
            .unwrap();
    }
    if let Some(body) = rest.strip_prefix("datetime(") {
        let end = body.find(')').unwrap();
        return json!(body[..end].to_string());
    }
    if let Some(body) = rest.strip_prefix('\'') {
        let end = body.find('\'').unwrap();
        return json!(body[..end].to_string());
    }
    panic!("unsupported literal in {}", rest);
}

fn row_from_command(cmd: &str, columns: &[&str]) -> Row {
    columns
        .iter()
        .map(|c| (c.to_string(), literal(cmd, c)))
        .collect()
}

const CHECKPOINT_COLUMNS: &[&str] = &[
    "ThreadId",
    "CheckpointNamespace",
    "CheckpointId",
    "ParentCheckpointId",
    "Snapshot",
    "CreatedAt",
];
const WRITE_COLUMNS: &[&str] = &["ThreadId", "CheckpointNamespace", "CheckpointId", "TaskId", "Writes", "CreatedAt"];

#[derive(Default)]
struct Views {
    checkpoints: Vec<Row>,
    writes: Vec<Row>,
}

fn scripted(views: Arc<Mutex<Views>>) -> Arc<MockKustoClient> {
    MockKustoClient::new()
        .with_responder(move |q| {
            let v = views.lock().unwrap();
            let rows = if q.starts_with("LangGraphCheckpointsWrites()") {
                v.writes.clone()
            } else {
                v.checkpoints.clone()
            };
            Ok(KustoResponse::with_rows(rows))
        })
        .into_arc()
}

fn saver(mock: Arc<MockKustoClient>) -> KustoCheckpointSaver<Value> {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
    KustoCheckpointSaver::new(mock, Arc::new(JsonSerializer))
        .with_clock(Arc::new(clock))
        .without_setup()
}

#[test]
fn put_put_writes_get_tuple_round_trip() {
    let views = Arc::new(Mutex::new(Views::default()));
    let mock = scripted(views.clone());
    let s = saver(mock.clone());

    let config = s
        .put(
            &RunnableConfig::for_thread("thread-1"),
            &Checkpoint::from_state(json!({"messages": ["hi"]})).with_id("c1"),
            &CheckpointMetadata::new(CheckpointSource::Input, 0),
        )
        .unwrap();
    s.put_writes(
        &config,
        &[("ch1".to_string(), json!("v1")), ("ch2".to_string(), json!("v2"))],
        "t1",
    )
    .unwrap();

    let cmds = mock.commands();
    assert_eq!(cmds.len(), 2);
    {
        let mut v = views.lock().unwrap();
        v.checkpoints.push(row_from_command(&cmds[0], CHECKPOINT_COLUMNS));
        v.writes.push(row_from_command(&cmds[1], WRITE_COLUMNS));
    }

    let tuple = s.get_tuple(&config).unwrap().unwrap();
    assert_eq!(tuple.checkpoint.id, "c1");
    assert_eq!(tuple.checkpoint.channel_values, json!({"messages": ["hi"]}));
    assert_eq!(tuple.metadata.source, CheckpointSource::Input);
    assert_eq!(tuple.parent_config, None);
    assert_eq!(
        tuple.pending_writes,
        vec![("ch1".to_string(), json!("v1")), ("ch2".to_string(), json!("v2"))]
    );
}

#[test]
fn parent_comes_from_the_callers_config() {
    let views = Arc::new(Mutex::new(Views::default()));
    let mock = scripted(views.clone());
    let s = saver(mock.clone());
    let c1 = s
        .put(
            &RunnableConfig::for_thread("t"),
            &Checkpoint::from_state(json!(1)).with_id("c1"),
            &CheckpointMetadata::new(CheckpointSource::Input, 0),
        )
        .unwrap();
    s.put(
        &c1,
        &Checkpoint::from_state(json!(2)).with_id("c2"),
        &CheckpointMetadata::new(CheckpointSource::Loop, 1),
    )
    .unwrap();
    let row = row_from_command(&mock.commands()[1], CHECKPOINT_COLUMNS);
    assert_eq!(row["ParentCheckpointId"], "c1");
    views.lock().unwrap().checkpoints.push(row);

    let tuple = s.get_tuple(&RunnableConfig::for_thread("t")).unwrap().unwrap();
    assert_eq!(tuple.checkpoint.channel_values, json!(2));
    assert_eq!(tuple.parent_config.unwrap().checkpoint_id.as_deref(), Some("c1"));
    assert!(mock.queries()[0].contains("| top 1 by CreatedAt desc"));
}

#[test]
fn list_before_resolves_the_checkpoint_timestamp() {
    let views = Arc::new(Mutex::new(Views::default()));
    let mock = scripted(views.clone());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()));
    let s: KustoCheckpointSaver<Value> = KustoCheckpointSaver::new(mock.clone(), Arc::new(JsonSerializer))
        .with_clock(clock.clone())
        .without_setup();

    let cfg = RunnableConfig::for_thread("t");
    s.put(&cfg, &Checkpoint::from_state(json!("a")).with_id("c1"), &CheckpointMetadata::new(CheckpointSource::Input, 0))
        .unwrap();
    clock.advance(Duration::seconds(1));
    s.put(&cfg, &Checkpoint::from_state(json!("b")).with_id("c2"), &CheckpointMetadata::new(CheckpointSource::Loop, 1))
        .unwrap();
    let c1 = row_from_command(&mock.commands()[0], CHECKPOINT_COLUMNS);
    assert_eq!(c1["CreatedAt"], "2024-07-01T00:00:00.000000Z");
    // What the view returns once `before_ts` excludes c2.
    views.lock().unwrap().checkpoints.push(c1);

    let listed = s.list(&cfg, None, Some("c2"), Some(10)).unwrap();
    let ids: Vec<&str> = listed.iter().map(|t| t.checkpoint.id.as_str()).collect();
    assert_eq!(ids, vec!["c1"]);
    let q = &mock.queries()[0];
    assert!(q.contains("CheckpointId == 'c2' | take 1 | project CreatedAt"));
    assert!(q.contains("CreatedAt < before_ts"));
    assert!(q.contains("| take 10"));
}

#[test]
fn delete_thread_is_filtered_on_read() {
    let mock = MockKustoClient::new().into_arc();
    let s = saver(mock.clone());
    s.delete_thread("t").unwrap();
    assert!(mock.commands()[0].ends_with("Deleted=true"));
    assert!(s.get_tuple(&RunnableConfig::for_thread("t")).unwrap().is_none());
    let q = &mock.queries()[0];
    assert!(q.contains("where ThreadId == 't' and Deleted == true"));
    assert!(q.contains("isnull(tombstone) or CreatedAt > tombstone"));
}

#[test]
fn put_without_thread_id_fails() {
    let s = saver(MockKustoClient::new().into_arc());
    let err = s
        .put(
            &RunnableConfig::default(),
            &Checkpoint::from_state(json!(null)),
            &CheckpointMetadata::new(CheckpointSource::Input, 0),
        )
        .unwrap_err();
    assert!(matches!(err, CheckpointError::MissingThreadId));
}

#[tokio::test]
async fn async_path_fails_not_implemented() {
    let s = saver(MockKustoClient::new().into_arc());
    let err = s
        .aput(
            &RunnableConfig::for_thread("t"),
            &Checkpoint::from_state(json!(1)),
            &CheckpointMetadata::new(CheckpointSource::Input, 0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CheckpointError::Kusto(langgraph_kusto::KustoError::NotImplemented(_))));
}
