//! Sequenced gateway payloads

use serde_json::Value;

/// A decoded gateway payload tagged with the sequence number it arrived with
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedPayload {
    sequence: u64,
    payload: Value,
}

impl SequencedPayload {
    #[must_use]
    pub fn new(sequence: u64, payload: Value) -> Self {
        Self { sequence, payload }
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Event name (`t`) when the payload is a whole dispatch frame
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.payload.get("t").and_then(Value::as_str)
    }
}
