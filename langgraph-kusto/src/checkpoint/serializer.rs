//! Serializer for checkpoint state (state <-> bytes).
//!
//! Aligns with LangGraph SerializerProtocol / JsonPlusSerializer. The saver stores the
//! bytes in the snapshot's `channel_values`: as structured JSON when they parse as JSON,
//! as text otherwise.

use serde_json::Value;

use super::checkpointer::CheckpointError;

/// Serializes and deserializes state for checkpoint storage.
pub trait Serializer<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    fn serialize(&self, state: &S) -> Result<Vec<u8>, CheckpointError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<S, CheckpointError>;
}

/// JSON-based serializer. Requires S: Serialize + serde::de::DeserializeOwned.
pub struct JsonSerializer;

impl<S> Serializer<S> for JsonSerializer
where
    S: Clone + Send + Sync + 'static + serde::Serialize + serde::de::DeserializeOwned,
{
    fn serialize(&self, state: &S) -> Result<Vec<u8>, CheckpointError> {
        serde_json::to_vec(state).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<S, CheckpointError> {
        serde_json::from_slice(bytes).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }
}

/// Bytes → storable value: parsed JSON, or UTF-8 text when the bytes are not JSON. A JSON
/// string stays text (quotes included) so it reads back byte for byte.
pub(crate) fn bytes_to_stored(bytes: &[u8]) -> Result<Value, CheckpointError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::String(_)) | Err(_) => {}
        Ok(v) => return Ok(v),
    }
    String::from_utf8(bytes.to_vec())
        .map(Value::String)
        .map_err(|e| CheckpointError::Serialization(format!("state is neither JSON nor text: {}", e)))
}

/// Stored value → bytes for [`Serializer::deserialize`]. Text is passed through as-is.
pub(crate) fn stored_to_bytes(value: &Value) -> Result<Vec<u8>, CheckpointError> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => serde_json::to_vec(other).map_err(|e| CheckpointError::Serialization(e.to_string())),
    }
}
