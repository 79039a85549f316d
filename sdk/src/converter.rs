//! Payload encoding shared by workflows, activities, queries and heartbeats

use serde_json::Value;

use crate::error::Result;

/// Turns values into the opaque bytes the service stores, and back.
///
/// Every payload crossing the worker boundary goes through one converter:
/// activity inputs and results, query answers, failure details and heartbeat
/// details.
pub trait DataConverter: Send + Sync {
    fn to_data(&self, value: &Value) -> Result<Vec<u8>>;

    /// Decode bytes; empty input decodes to `Value::Null`
    fn from_data(&self, data: &[u8]) -> Result<Value>;

    /// Decode an optional payload, treating `None` like empty bytes
    fn from_optional(&self, data: Option<&[u8]>) -> Result<Value> {
        self.from_data(data.unwrap_or_default())
    }
}

/// JSON encoding via serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDataConverter;

impl DataConverter for JsonDataConverter {
    fn to_data(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_data(&self, data: &[u8]) -> Result<Value> {
        if data.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(data)?)
    }
}
