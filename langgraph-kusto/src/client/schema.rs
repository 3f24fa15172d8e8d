//! Table and live-view provisioning.
//!
//! Four raw tables hold the append-only fact log; four stored functions expose the
//! de-duplicated live views that every read goes through.

use super::{KustoClient, TableNames};
use crate::error::KustoError;
use crate::logging::{log_command, log_setup_step};

/// Folder the live-view functions are created in.
pub const FUNCTION_FOLDER: &str = "langgraph";

/// One provisioning command with a human-readable step name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStep {
    pub name: &'static str,
    pub command: String,
}

/// `.create-merge table` commands for the four raw tables.
pub fn table_commands(names: &TableNames) -> Vec<SchemaStep> {
    vec![
        SchemaStep {
            name: "store table",
            command: format!(
                ".create-merge table {} (Namespace: string, Key: string, Value: dynamic, CreatedAt: datetime, UpdatedAt: datetime, Tags: dynamic, Deleted: bool)",
                names.store_raw()
            ),
        },
        SchemaStep {
            name: "embeddings table",
            command: format!(
                ".create-merge table {} (Namespace: string, ParentKey: string, ChunkOrdinal: long, ChunkString: string, Embedding: dynamic, EmbeddingUri: string, CreatedAt: datetime, UpdatedAt: datetime, Deleted: bool)",
                names.embeddings_raw()
            ),
        },
        SchemaStep {
            name: "checkpoints table",
            command: format!(
                ".create-merge table {} (ThreadId: string, CheckpointNamespace: string, CheckpointId: string, ParentCheckpointId: string, Snapshot: dynamic, CreatedAt: datetime, Deleted: bool)",
                names.checkpoints_raw()
            ),
        },
        SchemaStep {
            name: "checkpoint writes table",
            command: format!(
                ".create-merge table {} (ThreadId: string, CheckpointNamespace: string, CheckpointId: string, TaskId: string, Writes: dynamic, CreatedAt: datetime)",
                names.checkpoint_writes_raw()
            ),
        },
    ]
}

/// `.create-or-alter function` commands for the four live views.
pub fn view_commands(names: &TableNames) -> Vec<SchemaStep> {
    let view = |name: &str, body: String| {
        format!(
            ".create-or-alter function with (folder='{}') {}() {{ {} }}",
            FUNCTION_FOLDER, name, body
        )
    };
    vec![
        SchemaStep {
            name: "store view",
            command: view(
                &names.store,
                format!(
                    "{} | summarize arg_max(UpdatedAt, *) by Namespace, Key | where Deleted == false",
                    names.store_raw()
                ),
            ),
        },
        SchemaStep {
            name: "embeddings view",
            command: view(
                &names.embeddings,
                format!(
                    "{} | summarize arg_max(UpdatedAt, *) by Namespace, ParentKey, ChunkOrdinal | where Deleted == false",
                    names.embeddings_raw()
                ),
            ),
        },
        SchemaStep {
            name: "checkpoints view",
            command: view(
                &names.checkpoints,
                format!(
                    "{} | summarize arg_max(CreatedAt, *) by ThreadId, CheckpointNamespace, CheckpointId | where Deleted == false",
                    names.checkpoints_raw()
                ),
            ),
        },
        SchemaStep {
            name: "checkpoint writes view",
            command: view(&names.checkpoint_writes(), names.checkpoint_writes_raw()),
        },
    ]
}

/// Drop commands: functions first, then tables.
pub fn purge_commands(names: &TableNames) -> Vec<SchemaStep> {
    vec![
        SchemaStep {
            name: "store view",
            command: format!(".drop function {} ifexists", names.store),
        },
        SchemaStep {
            name: "embeddings view",
            command: format!(".drop function {} ifexists", names.embeddings),
        },
        SchemaStep {
            name: "checkpoints view",
            command: format!(".drop function {} ifexists", names.checkpoints),
        },
        SchemaStep {
            name: "checkpoint writes view",
            command: format!(".drop function {} ifexists", names.checkpoint_writes()),
        },
        SchemaStep {
            name: "store table",
            command: format!(".drop table {} ifexists", names.store_raw()),
        },
        SchemaStep {
            name: "embeddings table",
            command: format!(".drop table {} ifexists", names.embeddings_raw()),
        },
        SchemaStep {
            name: "checkpoints table",
            command: format!(".drop table {} ifexists", names.checkpoints_raw()),
        },
        SchemaStep {
            name: "checkpoint writes table",
            command: format!(".drop table {} ifexists", names.checkpoint_writes_raw()),
        },
    ]
}

/// Outcome of a provisioning run. Failed steps are reported, not raised.
#[derive(Debug, Default)]
pub struct SchemaReport {
    pub applied: Vec<&'static str>,
    pub failed: Vec<(&'static str, KustoError)>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn run_steps(client: &dyn KustoClient, steps: Vec<SchemaStep>) -> SchemaReport {
    let mut report = SchemaReport::default();
    for step in steps {
        log_command(step.name, &step.command);
        match client.execute_command(&step.command) {
            Ok(_) => {
                log_setup_step(step.name, None);
                report.applied.push(step.name);
            }
            Err(e) => {
                log_setup_step(step.name, Some(&e));
                report.failed.push((step.name, e));
            }
        }
    }
    report
}

/// Creates the raw tables and live views. A failing step is logged and skipped so that a
/// principal without table-admin rights can still run against pre-provisioned objects.
pub fn initialize(client: &dyn KustoClient, names: &TableNames) -> SchemaReport {
    let mut steps = table_commands(names);
    steps.extend(view_commands(names));
    run_steps(client, steps)
}

/// Drops every function and table this crate created. Missing objects are not an error.
pub fn purge(client: &dyn KustoClient, names: &TableNames) -> SchemaReport {
    run_steps(client, purge_commands(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockKustoClient;

    /// **Scenario**: initialize issues four table commands then four view commands.
    #[test]
    fn initialize_creates_tables_then_views() {
        let mock = MockKustoClient::new();
        let report = initialize(&mock, &TableNames::new("S", "C"));
        assert!(report.is_complete());
        assert_eq!(report.applied.len(), 8);

        let cmds = mock.commands();
        assert_eq!(cmds.len(), 8);
        assert!(cmds[0].starts_with(".create-merge table SRaw (Namespace: string, Key: string"));
        assert!(cmds[1].starts_with(".create-merge table SEmbeddingsRaw ("));
        assert!(cmds[1].contains("ChunkOrdinal: long"));
        assert!(cmds[2].starts_with(".create-merge table CRaw (ThreadId: string"));
        assert!(cmds[3].starts_with(".create-merge table CWritesRaw ("));
        assert_eq!(
            cmds[4],
            ".create-or-alter function with (folder='langgraph') S() { SRaw | summarize arg_max(UpdatedAt, *) by Namespace, Key | where Deleted == false }"
        );
        assert!(cmds[5].contains("by Namespace, ParentKey, ChunkOrdinal"));
        assert!(cmds[6].contains("arg_max(CreatedAt, *) by ThreadId, CheckpointNamespace, CheckpointId"));
        assert_eq!(
            cmds[7],
            ".create-or-alter function with (folder='langgraph') CWrites() { CWritesRaw }"
        );
    }

    /// **Scenario**: Failing steps are reported and the run continues.
    #[test]
    fn initialize_tolerates_failures() {
        let mock = MockKustoClient::new().with_command_error("Forbidden");
        let report = initialize(&mock, &TableNames::default());
        assert!(!report.is_complete());
        assert_eq!(report.failed.len(), 8);
        assert_eq!(mock.commands().len(), 8);
    }

    /// **Scenario**: purge drops functions before tables, all with ifexists.
    #[test]
    fn purge_drops_functions_then_tables() {
        let mock = MockKustoClient::new();
        purge(&mock, &TableNames::new("S", "C"));
        let cmds = mock.commands();
        assert_eq!(cmds[0], ".drop function S ifexists");
        assert_eq!(cmds[3], ".drop function CWrites ifexists");
        assert_eq!(cmds[4], ".drop table SRaw ifexists");
        assert_eq!(cmds[7], ".drop table CWritesRaw ifexists");
    }
}
