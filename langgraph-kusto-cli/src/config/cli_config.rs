//! CLI configuration: cluster connection, table names and the optional embedding service.

use std::sync::Arc;

use langgraph_kusto::{Embedder, KustoAiEmbedder, KustoClient, KustoConfig, OpenAiEmbedder, TableNames};

/// Error type for config loading and CLI runs.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Where vectors come from during a sanity run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingSource {
    /// No embedder; search falls back to text matching.
    Disabled,
    /// OpenAI-compatible `/embeddings` endpoint from `EMBEDDING_*`.
    OpenAi,
    /// The cluster's `ai_embeddings` plugin with this model URI.
    KustoAi(String),
}

/// Everything the subcommands need, loaded from env.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub kusto: KustoConfig,
    pub tables: TableNames,
    pub embedding: EmbeddingSource,
}

impl CliConfig {
    /// Loads from environment (caller loads .env first).
    ///
    /// `KUSTO_EMBEDDING_MODEL_URI` wins over `EMBEDDING_MODEL` / `EMBEDDING_API_KEY`; with
    /// neither set no embedder is used.
    pub fn from_env() -> Result<Self, Error> {
        let kusto = KustoConfig::from_env()?;
        let tables = TableNames::from_env();
        let embedding = match non_empty_env("KUSTO_EMBEDDING_MODEL_URI") {
            Some(uri) => EmbeddingSource::KustoAi(uri),
            None if non_empty_env("EMBEDDING_MODEL").is_some()
                || non_empty_env("EMBEDDING_API_KEY").is_some() =>
            {
                EmbeddingSource::OpenAi
            }
            None => EmbeddingSource::Disabled,
        };
        Ok(Self {
            kusto,
            tables,
            embedding,
        })
    }

    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_embedding(mut self, embedding: EmbeddingSource) -> Self {
        self.embedding = embedding;
        self
    }

    /// Builds the configured embedder; the Kusto plugin embedder shares `client`.
    pub fn embedder(&self, client: Arc<dyn KustoClient>) -> Option<Arc<dyn Embedder>> {
        match &self.embedding {
            EmbeddingSource::Disabled => None,
            EmbeddingSource::OpenAi => Some(Arc::new(OpenAiEmbedder::from_env())),
            EmbeddingSource::KustoAi(uri) => Some(Arc::new(KustoAiEmbedder::new(client, uri.clone()))),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Loads `.env` from the current directory, then from the parent (workspace root when run
/// from a crate directory). Missing files are ignored.
pub fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        return;
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(parent) = cwd.parent() {
            let _ = dotenv::from_path(parent.join(".env"));
        }
    }
}
