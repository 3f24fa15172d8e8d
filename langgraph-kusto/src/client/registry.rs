//! Explicit connection registry keyed by cluster endpoint.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::blocking::Client;

use super::{HttpKustoClient, KustoClient, KustoConfig};
use crate::error::KustoError;

/// Shares one HTTP connection pool per cluster endpoint.
///
/// Owned by whoever builds the store and saver; dropping the registry drops the pools once
/// no client still holds them.
#[derive(Default)]
pub struct ClientRegistry {
    pools: DashMap<String, Arc<Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a client for `config`, reusing the pool of a previous connect to the same cluster.
    pub fn connect(&self, config: KustoConfig) -> Result<Arc<dyn KustoClient>, KustoError> {
        Ok(Arc::new(self.connect_http(config)?))
    }

    /// Same as [`connect`](Self::connect) but returns the concrete client.
    pub fn connect_http(&self, config: KustoConfig) -> Result<HttpKustoClient, KustoError> {
        if let Some(pool) = self.pools.get(&config.cluster_uri) {
            return Ok(HttpKustoClient::with_http(pool.clone(), config));
        }
        let client = HttpKustoClient::new(config)?;
        let pool = self
            .pools
            .entry(client.config().cluster_uri.clone())
            .or_insert_with(|| client.pool())
            .clone();
        Ok(HttpKustoClient::with_http(pool, client.config().clone()))
    }

    /// Number of distinct endpoints with a live pool.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
