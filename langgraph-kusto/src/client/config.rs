//! Connection and table-name configuration. Can be filled from env / .env.
//!
//! Interacts with [`HttpKustoClient`](super::HttpKustoClient), [`ClientRegistry`](super::ClientRegistry)
//! and the `schema` / store / saver constructors that take table names.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::KustoError;

/// Default base name of the memory table (raw table is `<name>Raw`).
pub const DEFAULT_STORE_TABLE: &str = "LangGraphStore";
/// Default base name of the checkpoint table.
pub const DEFAULT_CHECKPOINTS_TABLE: &str = "LangGraphCheckpoints";

/// Connection parameters for one database on one cluster.
#[derive(Clone, Debug)]
pub struct KustoConfig {
    /// Cluster endpoint, e.g. `https://mycluster.westeurope.kusto.windows.net`.
    pub cluster_uri: String,
    /// Database name.
    pub database: String,
    /// Bearer token. Acquiring it is the caller's concern.
    pub access_token: Option<String>,
    /// Sent as the `servertimeout` request option.
    pub server_timeout: Duration,
    /// Extra request options merged into every request (e.g. `query_language`).
    pub default_properties: Map<String, Value>,
}

impl KustoConfig {
    /// Creates a config; fails fast when either parameter is empty.
    pub fn new(cluster_uri: impl Into<String>, database: impl Into<String>) -> Result<Self, KustoError> {
        let cluster_uri = cluster_uri.into();
        let database = database.into();
        if cluster_uri.trim().is_empty() {
            return Err(KustoError::Config("cluster_uri must not be empty".to_string()));
        }
        if database.trim().is_empty() {
            return Err(KustoError::Config("database must not be empty".to_string()));
        }
        Ok(Self {
            cluster_uri: cluster_uri.trim_end_matches('/').to_string(),
            database,
            access_token: None,
            server_timeout: Duration::from_secs(120),
            default_properties: Map::new(),
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.default_properties.insert(name.into(), value);
        self
    }

    /// Fill config from env vars (and .env when the caller loaded it).
    ///
    /// `KUSTO_CLUSTER_URI` and `KUSTO_DATABASE` required; `KUSTO_ACCESS_TOKEN` and
    /// `KUSTO_SERVER_TIMEOUT_SECS` optional.
    pub fn from_env() -> Result<Self, KustoError> {
        let cluster_uri = required_env("KUSTO_CLUSTER_URI")?;
        let database = required_env("KUSTO_DATABASE")?;
        let mut config = Self::new(cluster_uri, database)?;
        if let Ok(token) = std::env::var("KUSTO_ACCESS_TOKEN") {
            if !token.is_empty() {
                config.access_token = Some(token);
            }
        }
        if let Some(secs) = std::env::var("KUSTO_SERVER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.server_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn required_env(name: &str) -> Result<String, KustoError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(KustoError::Config(format!(
            "environment variable {} is required for Kusto configuration",
            name
        ))),
    }
}

/// Base table names. Raw tables and views are derived from these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    /// Memory live view; raw table is `<store>Raw`.
    pub store: String,
    /// Embedding live view; raw table is `<embeddings>Raw`.
    pub embeddings: String,
    /// Checkpoint live view; raw table is `<checkpoints>Raw`, writes are `<checkpoints>Writes[Raw]`.
    pub checkpoints: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_TABLE, DEFAULT_CHECKPOINTS_TABLE)
    }
}

impl TableNames {
    /// Embeddings default to `<store>Embeddings`.
    pub fn new(store: impl Into<String>, checkpoints: impl Into<String>) -> Self {
        let store = store.into();
        Self {
            embeddings: format!("{}Embeddings", store),
            store,
            checkpoints: checkpoints.into(),
        }
    }

    pub fn with_embeddings(mut self, embeddings: impl Into<String>) -> Self {
        self.embeddings = embeddings.into();
        self
    }

    /// `KUSTO_STORE_TABLE`, `KUSTO_STORE_EMBEDDINGS_TABLE`, `KUSTO_CHECKPOINTS_TABLE`; all optional.
    pub fn from_env() -> Self {
        let store =
            std::env::var("KUSTO_STORE_TABLE").unwrap_or_else(|_| DEFAULT_STORE_TABLE.to_string());
        let checkpoints = std::env::var("KUSTO_CHECKPOINTS_TABLE")
            .unwrap_or_else(|_| DEFAULT_CHECKPOINTS_TABLE.to_string());
        let mut names = Self::new(store, checkpoints);
        if let Ok(emb) = std::env::var("KUSTO_STORE_EMBEDDINGS_TABLE") {
            names.embeddings = emb;
        }
        names
    }

    pub fn store_raw(&self) -> String {
        format!("{}Raw", self.store)
    }

    pub fn embeddings_raw(&self) -> String {
        format!("{}Raw", self.embeddings)
    }

    pub fn checkpoints_raw(&self) -> String {
        format!("{}Raw", self.checkpoints)
    }

    pub fn checkpoint_writes(&self) -> String {
        format!("{}Writes", self.checkpoints)
    }

    pub fn checkpoint_writes_raw(&self) -> String {
        format!("{}WritesRaw", self.checkpoints)
    }
}
