//! Embedding function boundary.
//!
//! An [`Embedder`] turns text into `(vector, model identifier)`. Failures are returned as
//! [`StoreError`] and fail the whole write or search that asked for them.

use std::sync::Arc;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::store::StoreError;
use crate::client::{row_str, KustoClient};
use crate::kql::KqlBuilder;
use crate::logging::log_query;

/// Text to embedding vector plus the identifier of the model that produced it.
///
/// Any `Fn(&str) -> Result<(Vec<f32>, String), StoreError> + Send + Sync` is an embedder.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<(Vec<f32>, String), StoreError>;
}

impl<F> Embedder for F
where
    F: Fn(&str) -> Result<(Vec<f32>, String), StoreError> + Send + Sync,
{
    fn embed(&self, text: &str) -> Result<(Vec<f32>, String), StoreError> {
        self(text)
    }
}

/// Embeds through the cluster's `ai_embeddings` plugin: one query round trip per text.
pub struct KustoAiEmbedder {
    client: Arc<dyn KustoClient>,
    model_uri: String,
}

impl KustoAiEmbedder {
    /// `model_uri` is the plugin connection string, e.g.
    /// `https://<resource>.openai.azure.com/openai/deployments/<d>/embeddings?api-version=...;managed_identity=system`.
    pub fn new(client: Arc<dyn KustoClient>, model_uri: impl Into<String>) -> Self {
        Self {
            client,
            model_uri: model_uri.into(),
        }
    }
}

impl Embedder for KustoAiEmbedder {
    fn embed(&self, text: &str) -> Result<(Vec<f32>, String), StoreError> {
        let query = KqlBuilder::ai_embeddings(&self.model_uri, text);
        log_query("ai_embeddings", &query);
        let resp = self.client.execute_query(&query)?;
        let row = resp
            .primary_rows()
            .first()
            .ok_or_else(|| StoreError::Embedding("no embedding returned from ai_embeddings".to_string()))?;
        let cell = row
            .get("text_embeddings")
            .or_else(|| row.get("embedding"))
            .ok_or_else(|| StoreError::Embedding("ai_embeddings row has no embedding column".to_string()))?;
        // Dynamic cells may come back as JSON text.
        let parsed;
        let value = match cell.as_str() {
            Some(s) => {
                parsed = serde_json::from_str::<serde_json::Value>(s)
                    .map_err(|e| StoreError::Embedding(e.to_string()))?;
                &parsed
            }
            None => cell,
        };
        let vector = vector_from_json(value)?;
        if vector.is_empty() {
            let reason = row_str(row, "text_embedding_error").unwrap_or("empty vector");
            return Err(StoreError::Embedding(reason.to_string()));
        }
        Ok((vector, self.model_uri.clone()))
    }
}

fn vector_from_json(value: &serde_json::Value) -> Result<Vec<f32>, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::Embedding("embedding is not an array".to_string()))?;
    items
        .iter()
        .map(|x| {
            x.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| StoreError::Embedding("embedding component is not a number".to_string()))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// `EMBEDDING_BASE_URL` (default `https://api.openai.com/v1`), `EMBEDDING_API_KEY`,
    /// `EMBEDDING_MODEL` (default `text-embedding-3-small`).
    pub fn from_env() -> Self {
        let base = std::env::var("EMBEDDING_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let mut e = Self::new(base, model);
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            if !key.is_empty() {
                e.api_key = Some(key);
            }
        }
        e
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<(Vec<f32>, String), StoreError> {
        let url = format!("{}/embeddings", self.base_url);
        let mut req = self
            .http
            .post(&url)
            .json(&json!({ "model": self.model, "input": text }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().map_err(|e| StoreError::Embedding(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(StoreError::Embedding(format!("{}: {}", status, body)));
        }
        let parsed: EmbeddingsResponse = resp.json().map_err(|e| StoreError::Embedding(e.to_string()))?;
        let model = parsed.model.unwrap_or_else(|| self.model.clone());
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Embedding("no vector returned".to_string()))?;
        Ok((first.embedding, model))
    }
}
