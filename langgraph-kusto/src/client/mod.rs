//! # Remote store boundary
//!
//! Everything this crate knows about the cluster goes through two primitives on
//! [`KustoClient`]: `execute_query` (reads) and `execute_command` (management and
//! `.set-or-append` ingestion). Both take KQL text and return a [`KustoResponse`].
//!
//! | Type               | Role                                                        |
//! |--------------------|-------------------------------------------------------------|
//! | [`HttpKustoClient`] | Kusto REST v1 over `reqwest` (blocking)                    |
//! | [`ClientRegistry`]  | One connection pool per cluster endpoint, owned explicitly |
//! | [`MockKustoClient`] | Scripted double that records every request                 |
//!
//! The asynchronous variants exist on the trait but default to
//! [`KustoError::NotImplemented`]; callers on the async path fail immediately instead of
//! silently blocking.

mod config;
mod http;
mod mock;
mod registry;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::KustoError;

pub use config::{KustoConfig, TableNames};
pub use http::HttpKustoClient;
pub use mock::MockKustoClient;
pub use registry::ClientRegistry;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Column descriptor of a result table.
#[derive(Debug, Clone, PartialEq)]
pub struct KustoColumn {
    pub name: String,
    pub column_type: String,
}

/// One result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KustoTable {
    pub name: String,
    pub columns: Vec<KustoColumn>,
    pub rows: Vec<Row>,
}

impl KustoTable {
    /// Builds a table from rows; columns are taken from the first row.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|r| {
                r.keys()
                    .map(|k| KustoColumn {
                        name: k.clone(),
                        column_type: "dynamic".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: "PrimaryResult".to_string(),
            columns,
            rows,
        }
    }
}

/// Tabular response to a query or command. The first table is the primary result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KustoResponse {
    pub tables: Vec<KustoTable>,
}

impl KustoResponse {
    /// Response with a single primary table holding `rows`.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            tables: vec![KustoTable::from_rows(rows)],
        }
    }

    /// Response with an empty primary table.
    pub fn empty() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn primary(&self) -> Option<&KustoTable> {
        self.tables.first()
    }

    /// Rows of the primary result; empty when there is none.
    pub fn primary_rows(&self) -> &[Row] {
        self.primary().map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    /// Consumes the response, returning the primary rows.
    pub fn into_primary_rows(self) -> Vec<Row> {
        self.tables
            .into_iter()
            .next()
            .map(|t| t.rows)
            .unwrap_or_default()
    }
}

/// Reads a datetime column. Accepts ISO-8601 strings; anything else is `None`.
pub fn row_datetime(row: &Row, column: &str) -> Option<DateTime<Utc>> {
    match row.get(column)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok(),
        _ => None,
    }
}

/// Reads a string column; `None` when absent or null.
pub fn row_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

/// Executes KQL against one database.
///
/// Implementations must be shareable across threads; the store and the checkpoint saver hold
/// them as `Arc<dyn KustoClient>`.
#[async_trait]
pub trait KustoClient: Send + Sync {
    /// Database every request targets.
    fn database(&self) -> &str;

    /// Runs a read query.
    fn execute_query(&self, query: &str) -> Result<KustoResponse, KustoError>;

    /// Runs a management or ingestion command.
    fn execute_command(&self, command: &str) -> Result<KustoResponse, KustoError>;

    /// Asynchronous query. Not implemented unless a client overrides it.
    async fn execute_query_async(&self, _query: &str) -> Result<KustoResponse, KustoError> {
        Err(KustoError::NotImplemented("async kusto query execution"))
    }

    /// Asynchronous command. Not implemented unless a client overrides it.
    async fn execute_command_async(&self, _command: &str) -> Result<KustoResponse, KustoError> {
        Err(KustoError::NotImplemented("async kusto command execution"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    /// **Scenario**: primary_rows returns the first table's rows, or empty when no tables.
    #[test]
    fn response_primary_rows() {
        let resp = KustoResponse::with_rows(vec![row(json!({"A": 1}))]);
        assert_eq!(resp.primary_rows().len(), 1);
        assert_eq!(resp.primary().unwrap().columns[0].name, "A");
        assert!(KustoResponse::default().primary_rows().is_empty());
        assert!(KustoResponse::empty().primary_rows().is_empty());
    }

    /// **Scenario**: row_datetime parses RFC 3339 and ignores other shapes.
    #[test]
    fn row_datetime_parses_iso() {
        let r = row(json!({"CreatedAt": "2024-01-01T10:00:00Z", "Bad": 5, "Text": "x"}));
        let dt = row_datetime(&r, "CreatedAt").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T10:00:00+00:00");
        assert!(row_datetime(&r, "Bad").is_none());
        assert!(row_datetime(&r, "Text").is_none());
        assert!(row_datetime(&r, "Missing").is_none());
    }

    struct SyncOnly;

    #[async_trait]
    impl KustoClient for SyncOnly {
        fn database(&self) -> &str {
            "db"
        }
        fn execute_query(&self, _query: &str) -> Result<KustoResponse, KustoError> {
            Ok(KustoResponse::empty())
        }
        fn execute_command(&self, _command: &str) -> Result<KustoResponse, KustoError> {
            Ok(KustoResponse::empty())
        }
    }

    /// **Scenario**: The default async methods fail immediately with NotImplemented.
    #[tokio::test]
    async fn async_defaults_are_not_implemented() {
        let c = SyncOnly;
        let q = c.execute_query_async("T").await.unwrap_err();
        let cmd = c.execute_command_async(".show tables").await.unwrap_err();
        assert!(matches!(q, KustoError::NotImplemented(_)));
        assert!(matches!(cmd, KustoError::NotImplemented(_)));
    }
}
