//! `setup` / `purge`: provision or drop the tables and live views.

use langgraph_kusto::client::schema::{self, SchemaReport};
use langgraph_kusto::{KustoClient, TableNames};

/// Creates the raw tables and live views. Failed steps are reported, not raised.
pub fn setup(client: &dyn KustoClient, tables: &TableNames) -> SchemaReport {
    tracing::info!(store = %tables.store, checkpoints = %tables.checkpoints, "Provisioning kusto schema");
    schema::initialize(client, tables)
}

/// Drops every function and table the store and saver use.
pub fn purge(client: &dyn KustoClient, tables: &TableNames) -> SchemaReport {
    tracing::info!(store = %tables.store, checkpoints = %tables.checkpoints, "Purging kusto schema");
    schema::purge(client, tables)
}

/// Prints applied and failed steps to stdout / stderr.
pub fn print_schema_report(title: &str, report: &SchemaReport) {
    println!("{}: {} applied, {} failed", title, report.applied.len(), report.failed.len());
    for step in &report.applied {
        println!("  ok    {}", step);
    }
    for (step, err) in &report.failed {
        eprintln!("  fail  {}: {}", step, err);
    }
}
