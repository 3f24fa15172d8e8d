//! Remote-store error types.
//!
//! Returned by every [`KustoClient`](crate::client::KustoClient) call. Store and checkpoint
//! errors wrap this type transparently so remote faults reach the caller unmodified.

use thiserror::Error;

/// Fault raised at the remote-store boundary.
///
/// No variant is retried by this crate; retry and deadline policy belong to the caller
/// or to the HTTP client configuration.
#[derive(Debug, Error)]
pub enum KustoError {
    /// Required connection parameters are missing or invalid. Raised at construction.
    #[error("configuration error: {0}")]
    Config(String),
    /// The service rejected the query or command.
    #[error("kusto request failed ({status}): {message}")]
    Remote { status: u16, message: String },
    /// Transport failure before a response was received.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response or a row had an unexpected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// The asynchronous low-level path is not available for this client.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
