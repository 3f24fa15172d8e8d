//! Mock KustoClient for tests and examples.
//!
//! Records every query and command; answers queries through a scripted responder and
//! commands with an empty response. No cluster required.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{KustoClient, KustoResponse, Row};
use crate::error::KustoError;

type Responder = dyn Fn(&str) -> Result<KustoResponse, KustoError> + Send + Sync;

/// Mock client: scripted query results, recorded traffic.
///
/// `execute_query(q)` returns `responder(q)` (empty table by default); `execute_command`
/// records the command and returns an empty response, or the configured command error.
///
/// **Interaction**: Implements `KustoClient`; used by store, saver and schema tests.
pub struct MockKustoClient {
    database: String,
    responder: Box<Responder>,
    command_error: Option<String>,
    queries: Mutex<Vec<String>>,
    commands: Mutex<Vec<String>>,
}

impl MockKustoClient {
    /// Creates a mock whose queries all return an empty primary table.
    pub fn new() -> Self {
        Self {
            database: "TestDB".to_string(),
            responder: Box::new(|_| Ok(KustoResponse::empty())),
            command_error: None,
            queries: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Answer queries with `f(query)` (builder style).
    pub fn with_responder<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<KustoResponse, KustoError> + Send + Sync + 'static,
    {
        self.responder = Box::new(f);
        self
    }

    /// Answer every query with the same rows (builder style).
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.with_responder(move |_| Ok(KustoResponse::with_rows(rows.clone())))
    }

    /// Reject every command with a remote fault carrying `message` (builder style).
    pub fn with_command_error(mut self, message: impl Into<String>) -> Self {
        self.command_error = Some(message.into());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    /// Commands received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }

    /// Forget recorded traffic.
    pub fn clear(&self) {
        lock(&self.queries).clear();
        lock(&self.commands).clear();
    }
}

impl Default for MockKustoClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[async_trait]
impl KustoClient for MockKustoClient {
    fn database(&self) -> &str {
        &self.database
    }

    fn execute_query(&self, query: &str) -> Result<KustoResponse, KustoError> {
        lock(&self.queries).push(query.to_string());
        (self.responder)(query)
    }

    fn execute_command(&self, command: &str) -> Result<KustoResponse, KustoError> {
        lock(&self.commands).push(command.to_string());
        match &self.command_error {
            Some(message) => Err(KustoError::Remote {
                status: 400,
                message: message.clone(),
            }),
            None => Ok(KustoResponse::empty()),
        }
    }
}
