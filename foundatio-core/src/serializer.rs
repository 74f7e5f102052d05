use thiserror::Error;

/// Errors produced while serializing or deserializing a work-item payload.
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

/// Converts typed payloads to and from the opaque bytes carried by a
/// [`WorkItemEnvelope`](crate) across enqueue/dequeue.
///
/// Out of scope per spec §1 ("a serializer for work-item payloads"); this
/// trait plus [`JsonSerializer`] is the bundled default, the same way the
/// cache and message bus traits ship an in-memory default.
pub trait Serializer: Send + Sync {
    fn serialize<T: serde::Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializerError>;
    fn deserialize<T: serde::de::DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializerError>;
}

/// JSON serializer backed by `serde_json`, matching the serialization stack
/// used across the workspace.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: serde::Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(value).map_err(|e| SerializerError::Serialize(e.to_string()))
    }

    fn deserialize<T: serde::de::DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializerError> {
        serde_json::from_slice(bytes).map_err(|e| SerializerError::Deserialize(e.to_string()))
    }
}
