//! Unit tests for the subcommand bodies over [`MockKustoClient`].
//!
//! Scenarios: setup and purge report every step, tolerated failures are reported,
//! sanity stops at the first failing step and surfaces remote faults.

use langgraph_kusto::{KustoConfig, MockKustoClient, TableNames};

use crate::config::{CliConfig, EmbeddingSource};
use crate::run::{purge, sanity, setup};

fn config() -> CliConfig {
    CliConfig {
        kusto: KustoConfig::new("https://c.kusto.windows.net", "agents").unwrap(),
        tables: TableNames::default(),
        embedding: EmbeddingSource::Disabled,
    }
}

/// **Scenario**: setup applies one command per table and view and reports all of them.
///
/// Given: a client that accepts every command  
/// When: setup runs  
/// Then: the report is complete and lists exactly the commands sent, tables first
#[test]
fn setup_reports_every_step() {
    let mock = MockKustoClient::new();
    let report = setup(&mock, &TableNames::default());
    let cmds = mock.commands();
    assert!(report.is_complete());
    assert_eq!(report.applied.len(), cmds.len());
    assert!(cmds[0].starts_with(".create-merge table LangGraphStoreRaw"));
    assert!(cmds.iter().any(|c| c.contains("function with (folder='langgraph') LangGraphStore()")));
}

/// **Scenario**: setup against a principal without admin rights reports failures instead of raising.
#[test]
fn setup_tolerates_failed_steps() {
    let mock = MockKustoClient::new().with_command_error("Forbidden (403)");
    let report = setup(&mock, &TableNames::default());
    assert!(!report.is_complete());
    assert!(report.applied.is_empty());
    assert!(report.failed[0].1.to_string().contains("Forbidden"));
}

/// **Scenario**: purge drops objects under the configured table names.
#[test]
fn purge_uses_configured_names() {
    let mock = MockKustoClient::new();
    let report = purge(&mock, &TableNames::new("Mem", "Ckpt"));
    assert!(report.is_complete());
    let cmds = mock.commands();
    assert!(cmds.iter().any(|c| c.contains("MemRaw")));
    assert!(cmds.iter().any(|c| c.contains("CkptWritesRaw")));
    assert!(cmds.iter().all(|c| c.contains("ifexists")));
}

/// **Scenario**: sanity fails at the get step when the probe cannot be read back.
///
/// Given: a client that accepts writes but whose views are always empty  
/// When: sanity runs  
/// Then: the put step passes, the error names the get step
#[test]
fn sanity_fails_when_probe_is_not_read_back() {
    let mock = MockKustoClient::new().into_arc();
    let err = sanity(mock.clone(), &config()).unwrap_err().to_string();
    assert!(err.contains("store get"), "unexpected error: {}", err);
    assert!(mock
        .commands()
        .iter()
        .any(|c| c.starts_with(".set-or-append LangGraphStoreRaw <| print Namespace='langgraph-kusto-sanity/")));
}

/// **Scenario**: A rejected ingestion surfaces the remote fault unmodified.
#[test]
fn sanity_surfaces_remote_faults() {
    let mock = MockKustoClient::new().with_command_error("table not found").into_arc();
    let err = sanity(mock, &config()).unwrap_err().to_string();
    assert!(err.contains("table not found"), "unexpected error: {}", err);
}
