//! Integration tests for KustoStore over a scripted client.
//!
//! The responders stand in for the live views: each returns what the cluster would return
//! for the query it recognizes. Verifies upsert timestamps, soft delete, segment-aware
//! namespace matching, embedding call counts per index config, and similarity paging.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use langgraph_kusto::client::KustoResponse;
use langgraph_kusto::memory::namespace;
use langgraph_kusto::{
    BaseStore, Embedder, IndexConfig, KustoStore, KustoStoreConfig, ListNamespacesOp, ManualClock,
    MatchCondition, MockKustoClient, Row, SearchOp, StoreError,
};
use serde_json::{json, Value};

fn row(v: Value) -> Row {
    v.as_object().cloned().unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()))
}

fn store(mock: Arc<MockKustoClient>, clock: Arc<ManualClock>) -> KustoStore {
    KustoStore::new(mock, KustoStoreConfig::default().with_clock(clock).without_setup())
}

struct CountingEmbedder(AtomicUsize);

impl CountingEmbedder {
    fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, _text: &str) -> Result<(Vec<f32>, String), StoreError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok((vec![0.1, 0.2, 0.3], "counting".to_string()))
    }
}

#[test]
fn upsert_keeps_first_created_at_and_bumps_updated_at() {
    let clock = clock();
    let first = MockKustoClient::new().into_arc();
    store(first.clone(), clock.clone())
        .put(&["prefs", "u1"], "theme", json!({"v": 1}))
        .unwrap();
    assert!(first.commands()[0].contains("CreatedAt=datetime(2024-06-01T09:00:00.000000Z)"));

    clock.advance(Duration::minutes(5));
    let second = MockKustoClient::new()
        .with_rows(vec![row(json!({"CreatedAt": "2024-06-01T09:00:00Z"}))])
        .into_arc();
    store(second.clone(), clock.clone())
        .put(&["prefs", "u1"], "theme", json!({"v": 2}))
        .unwrap();
    let cmd = &second.commands()[0];
    assert!(second.queries()[0].contains("Namespace == 'prefs/u1' and Key == 'theme'"));
    assert!(cmd.contains("Value=dynamic({\"v\":2})"));
    assert!(cmd.contains("CreatedAt=datetime(2024-06-01T09:00:00.000000Z)"));
    assert!(cmd.contains("UpdatedAt=datetime(2024-06-01T09:05:00.000000Z)"));

    let live = MockKustoClient::new()
        .with_rows(vec![row(json!({
            "Namespace": "prefs/u1",
            "Key": "theme",
            "Value": {"v": 2},
            "CreatedAt": "2024-06-01T09:00:00Z",
            "UpdatedAt": "2024-06-01T09:05:00Z"
        }))])
        .into_arc();
    let item = store(live, clock)
        .get(&["prefs", "u1"], "theme")
        .unwrap()
        .unwrap();
    assert_eq!(item.value, json!({"v": 2}));
    assert_eq!(item.namespace, namespace(&["prefs", "u1"]));
    assert_eq!(item.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
    assert_eq!(item.updated_at, Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 0).unwrap());
}

#[test]
fn delete_appends_tombstone_and_get_is_absent() {
    let mock = MockKustoClient::new().into_arc();
    let s = store(mock.clone(), clock());
    s.delete(&["prefs", "u1"], "theme").unwrap();
    let cmds = mock.commands();
    assert_eq!(cmds.len(), 1);
    assert!(cmds[0].starts_with(".set-or-append LangGraphStoreRaw <| print Namespace='prefs/u1', Key='theme'"));
    assert!(cmds[0].ends_with("Deleted=true"));
    assert!(s.get(&["prefs", "u1"], "theme").unwrap().is_none());
}

#[test]
fn prefix_match_is_segment_aware() {
    // Stands in for a live view holding one record under a/b.
    let mock = MockKustoClient::new()
        .with_responder(|q| {
            let rows = if q.contains("Namespace startswith_cs 'a/'") {
                vec![row(json!({"Namespace": "a/b", "Key": "k", "Value": {"x": 1}}))]
            } else {
                Vec::new()
            };
            Ok(KustoResponse::with_rows(rows))
        })
        .into_arc();
    let s = store(mock.clone(), clock());
    assert!(s.get(&["a"], "k").unwrap().is_some());
    assert!(s.get(&["b"], "k").unwrap().is_none());
    let q = &mock.queries()[1];
    assert!(q.contains("(Namespace == 'b' or Namespace startswith_cs 'b/')"));
}

#[test]
fn embedding_calls_follow_index_config() {
    let embedder = Arc::new(CountingEmbedder(AtomicUsize::new(0)));
    let mock = MockKustoClient::new().into_arc();
    let s = KustoStore::new(
        mock.clone(),
        KustoStoreConfig::default()
            .with_embedder(embedder.clone())
            .with_clock(clock())
            .without_setup(),
    );
    let value = json!({"title": "T", "body": "B", "tags": ["x", "y"]});

    s.put_with_index(&["docs"], "1", value.clone(), IndexConfig::Disabled).unwrap();
    assert_eq!(embedder.calls(), 0);
    assert_eq!(mock.commands().len(), 1);

    s.put_with_index(&["docs"], "1", value.clone(), IndexConfig::Default).unwrap();
    assert_eq!(embedder.calls(), 1);

    s.put_with_index(&["docs"], "1", value.clone(), IndexConfig::paths(["title", "body", "missing"]))
        .unwrap();
    assert_eq!(embedder.calls(), 3);

    s.put_with_index(&["docs"], "1", value, IndexConfig::paths(["tags[*]"])).unwrap();
    assert_eq!(embedder.calls(), 5);
    let last = mock.commands().pop().unwrap();
    assert!(last.starts_with(".set-or-append LangGraphStoreEmbeddingsRaw <|"));
    assert!(last.contains("ChunkOrdinal=0, ChunkString='x'"));
    assert!(last.contains("ChunkOrdinal=1, ChunkString='y'"));
}

#[test]
fn similarity_search_orders_by_score_and_respects_limit() {
    let mock = MockKustoClient::new()
        .with_rows(
            (0..6)
                .map(|i| {
                    row(json!({
                        "Namespace": "docs",
                        "Key": format!("k{}", i),
                        "Value": {"i": i},
                        "Score": (i as f64) / 10.0
                    }))
                })
                .collect(),
        )
        .into_arc();
    let s = KustoStore::new(
        mock.clone(),
        KustoStoreConfig::default()
            .with_embedder(Arc::new(CountingEmbedder(AtomicUsize::new(0))))
            .with_clock(clock())
            .without_setup(),
    );
    let hits = s.search(SearchOp::new(&["docs"]).with_query("find").with_limit(3)).unwrap();
    assert_eq!(hits.len(), 3);
    let scores: Vec<f64> = hits.iter().map(|h| h.score.unwrap()).collect();
    assert_eq!(scores, vec![0.5, 0.4, 0.3]);
    assert!(mock.queries()[0].contains("series_cosine_similarity"));
}

#[test]
fn text_search_has_no_scores() {
    let mock = MockKustoClient::new()
        .with_rows(vec![row(json!({"Namespace": "docs", "Key": "k", "Value": "{\"a\":1}"}))])
        .into_arc();
    let hits = store(mock, clock())
        .search(SearchOp::new(&["docs"]).with_query("a"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, None);
    assert_eq!(hits[0].value, json!({"a": 1}));
}

#[test]
fn list_namespaces_truncates_to_max_depth() {
    let mock = MockKustoClient::new()
        .with_rows(vec![
            row(json!({"Namespace": "users/u1"})),
            row(json!({"Namespace": "users/u2"})),
        ])
        .into_arc();
    let got = store(mock.clone(), clock())
        .list_namespaces(
            ListNamespacesOp::default()
                .with_condition(MatchCondition::prefix(&["users"]))
                .with_max_depth(2),
        )
        .unwrap();
    assert_eq!(got, vec![namespace(&["users", "u1"]), namespace(&["users", "u2"])]);
    assert!(mock.queries()[0].contains("array_slice(split(Namespace, '/'), 0, 1)"));
}

#[test]
fn remote_fault_propagates_unmodified() {
    let mock = MockKustoClient::new()
        .with_command_error("table not found")
        .into_arc();
    let err = store(mock, clock())
        .put(&["a"], "k", json!({}))
        .unwrap_err();
    match err {
        StoreError::Kusto(e) => assert!(e.to_string().contains("table not found")),
        other => panic!("expected remote fault, got {:?}", other),
    }
}
