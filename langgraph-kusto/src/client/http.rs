//! Kusto REST v1 client.
//!
//! Queries go to `POST {cluster}/v1/rest/query`, commands to `POST {cluster}/v1/rest/mgmt`.
//! The v1 response is `{"Tables": [{"TableName", "Columns", "Rows"}]}`; rows are converted
//! to column-keyed maps so callers address cells by name.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{KustoClient, KustoColumn, KustoConfig, KustoResponse, KustoTable, Row};
use crate::error::KustoError;

/// Prefix of the `x-ms-client-request-id` header.
pub const CLIENT_REQUEST_ID_PREFIX: &str = "langgraph-kusto";

#[derive(Debug, Deserialize)]
struct V1Response {
    #[serde(rename = "Tables", default)]
    tables: Vec<V1Table>,
}

#[derive(Debug, Deserialize)]
struct V1Table {
    #[serde(rename = "TableName", default)]
    table_name: String,
    #[serde(rename = "Columns", default)]
    columns: Vec<V1Column>,
    #[serde(rename = "Rows", default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct V1Column {
    #[serde(rename = "ColumnName")]
    column_name: String,
    #[serde(rename = "ColumnType", default)]
    column_type: Option<String>,
    #[serde(rename = "DataType", default)]
    data_type: Option<String>,
}

/// Blocking HTTP client for one database.
///
/// Cheap to clone; the underlying connection pool is shared. Use
/// [`ClientRegistry`](super::ClientRegistry) to share the pool across databases on the same
/// cluster.
#[derive(Clone)]
pub struct HttpKustoClient {
    http: Arc<Client>,
    config: KustoConfig,
}

impl HttpKustoClient {
    /// Creates a client with its own connection pool.
    pub fn new(config: KustoConfig) -> Result<Self, KustoError> {
        let http = Client::builder()
            .timeout(config.server_timeout + std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self::with_http(Arc::new(http), config))
    }

    /// Creates a client over an existing connection pool.
    pub fn with_http(http: Arc<Client>, config: KustoConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &KustoConfig {
        &self.config
    }

    /// Connection pool shared by clones of this client.
    pub(crate) fn pool(&self) -> Arc<Client> {
        self.http.clone()
    }

    fn request_body(&self, csl: &str) -> Value {
        let mut options = Map::new();
        options.insert(
            "servertimeout".to_string(),
            Value::String(format_timespan(self.config.server_timeout)),
        );
        for (k, v) in &self.config.default_properties {
            options.insert(k.clone(), v.clone());
        }
        json!({
            "db": self.config.database,
            "csl": csl,
            "properties": { "Options": options },
        })
    }

    fn post(&self, path: &str, csl: &str) -> Result<KustoResponse, KustoError> {
        let url = format!("{}{}", self.config.cluster_uri, path);
        let request_id = format!("{};{}", CLIENT_REQUEST_ID_PREFIX, uuid::Uuid::new_v4());
        let mut req = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("x-ms-client-request-id", &request_id)
            .header("x-ms-app", CLIENT_REQUEST_ID_PREFIX)
            .json(&self.request_body(csl));
        if let Some(token) = &self.config.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(KustoError::Remote {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        parse_v1_response(&text)
    }
}

#[async_trait]
impl KustoClient for HttpKustoClient {
    fn database(&self) -> &str {
        &self.config.database
    }

    fn execute_query(&self, query: &str) -> Result<KustoResponse, KustoError> {
        self.post("/v1/rest/query", query)
    }

    fn execute_command(&self, command: &str) -> Result<KustoResponse, KustoError> {
        self.post("/v1/rest/mgmt", command)
    }
}

/// Formats a duration as a KQL timespan option value (`hh:mm:ss`).
fn format_timespan(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Extracts the most specific message from a Kusto error body.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| {
            e.get("@message")
                .or_else(|| e.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Parses a v1 REST response body into column-keyed rows.
pub(crate) fn parse_v1_response(body: &str) -> Result<KustoResponse, KustoError> {
    let parsed: V1Response = serde_json::from_str(body)?;
    let mut tables = Vec::with_capacity(parsed.tables.len());
    for t in parsed.tables {
        let mut rows = Vec::with_capacity(t.rows.len());
        for cells in t.rows {
            if cells.len() != t.columns.len() {
                return Err(KustoError::Decode(format!(
                    "table {} row has {} cells, expected {}",
                    t.table_name,
                    cells.len(),
                    t.columns.len()
                )));
            }
            let row: Row = t
                .columns
                .iter()
                .map(|c| c.column_name.clone())
                .zip(cells)
                .collect();
            rows.push(row);
        }
        tables.push(KustoTable {
            name: t.table_name,
            columns: t
                .columns
                .into_iter()
                .map(|c| KustoColumn {
                    name: c.column_name,
                    column_type: c.column_type.or(c.data_type).unwrap_or_default(),
                })
                .collect(),
            rows,
        });
    }
    Ok(KustoResponse { tables })
}
