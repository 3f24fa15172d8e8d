//! [`BaseStore`] backed by a Kusto database.

use std::sync::{Arc, Once};

use async_trait::async_trait;

use super::embedder::Embedder;
use super::layer::KustoMemoryLayer;
use super::store::{BaseStore, Op, OpResult, StoreError};
use super::translator::{translate_op, translate_result};
use crate::client::{schema, KustoClient, TableNames};
use crate::clock::{Clock, MonotonicClock};

/// Options for [`KustoStore`].
pub struct KustoStoreConfig {
    pub tables: TableNames,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub clock: Arc<dyn Clock>,
    /// Provision tables and views before the first synchronous batch.
    pub setup: bool,
}

impl Default for KustoStoreConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            embedder: None,
            clock: Arc::new(MonotonicClock::new()),
            setup: true,
        }
    }
}

impl KustoStoreConfig {
    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Skip provisioning; the tables and views must already exist.
    pub fn without_setup(mut self) -> Self {
        self.setup = false;
        self
    }
}

/// Long-term memory store on Kusto.
///
/// Every write appends to the raw tables; reads go through the live views, so the newest
/// row per key wins and tombstoned keys disappear. With an embedder, puts also write
/// embedding chunks and searches with a query rank by cosine similarity.
///
/// **Interaction**: Used as `Arc<dyn BaseStore>`. Holds an `Arc<dyn KustoClient>`, usually
/// from [`ClientRegistry`](crate::client::ClientRegistry).
pub struct KustoStore {
    client: Arc<dyn KustoClient>,
    tables: TableNames,
    layer: KustoMemoryLayer,
    clock: Arc<dyn Clock>,
    setup: bool,
    setup_once: Once,
}

impl KustoStore {
    pub fn new(client: Arc<dyn KustoClient>, config: KustoStoreConfig) -> Self {
        Self {
            client,
            layer: KustoMemoryLayer::new(config.embedder, config.clock.clone()),
            tables: config.tables,
            clock: config.clock,
            setup: config.setup,
            setup_once: Once::new(),
        }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Whether searches with a query use vector similarity.
    pub fn is_vector_enabled(&self) -> bool {
        self.layer.has_embedder()
    }

    fn ensure_setup(&self) {
        if !self.setup {
            return;
        }
        self.setup_once.call_once(|| {
            let report = schema::initialize(self.client.as_ref(), &self.tables);
            if !report.is_complete() {
                tracing::warn!(
                    failed = report.failed.len(),
                    "Store schema provisioning incomplete"
                );
            }
        });
    }
}

#[async_trait]
impl BaseStore for KustoStore {
    fn batch(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, StoreError> {
        self.ensure_setup();
        let mut results = Vec::with_capacity(ops.len());
        for op in &ops {
            let memory_op = translate_op(op, &self.tables)?;
            let raw = self.layer.execute(memory_op, self.client.as_ref())?;
            results.push(translate_result(op, raw, self.clock.now())?);
        }
        Ok(results)
    }

    /// No provisioning on this path; it only uses the client's async primitives.
    async fn abatch(&self, ops: Vec<Op>) -> Result<Vec<OpResult>, StoreError> {
        let mut results = Vec::with_capacity(ops.len());
        for op in &ops {
            let memory_op = translate_op(op, &self.tables)?;
            let raw = self.layer.aexecute(memory_op, self.client.as_ref()).await?;
            results.push(translate_result(op, raw, self.clock.now())?);
        }
        Ok(results)
    }
}
