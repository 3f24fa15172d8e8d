//! Logging helpers for store and checkpoint traffic.
//!
//! Every query and command sent to the cluster passes through one of these so that
//! `RUST_LOG=langgraph_kusto=debug` shows the full request stream.

/// Log a read query about to be sent.
pub fn log_query(operation: &str, query: &str) {
    tracing::debug!(operation, len = query.len(), query, "Executing kusto query");
}

/// Log a management / ingestion command about to be sent.
pub fn log_command(operation: &str, command: &str) {
    tracing::debug!(operation, len = command.len(), command, "Executing kusto command");
}

/// Log dispatch of one store operation.
pub fn log_op(kind: &str, namespace: &str) {
    tracing::debug!(kind, namespace, "Dispatching memory operation");
}

/// Log a schema provisioning step and its outcome.
pub fn log_setup_step(step: &str, error: Option<&crate::error::KustoError>) {
    match error {
        None => tracing::info!(step, "Provisioned kusto object"),
        Some(e) => tracing::warn!(step, error = %e, "Kusto provisioning step skipped or failed"),
    }
}

/// Log a thread tombstone.
pub fn log_thread_deleted(thread_id: &str) {
    tracing::info!(thread_id, "Thread soft-deleted");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_functions() {
        // These should not panic
        log_query("get", "T() | take 1");
        log_command("put", ".set-or-append T <| print A=1");
        log_op("search", "users/u1");
        log_setup_step("store table", None);
        log_setup_step(
            "store view",
            Some(&crate::error::KustoError::Config("x".to_string())),
        );
        log_thread_deleted("t1");
    }
}
