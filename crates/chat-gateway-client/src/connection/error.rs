//! Connection error types

use crate::protocol::OpCode;
use crate::queue::QueueError;
use thiserror::Error;

/// Gateway connection error type
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Frame is not a valid gateway message
    #[error("Failed to decode gateway frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// Frame envelope is fine but its `d` is not what the op requires
    #[error("Malformed {0} payload")]
    MalformedPayload(OpCode),

    /// Dispatch frame without `s`
    #[error("Dispatch {event} carries no sequence number")]
    MissingSequence { event: String },

    /// Dispatch received before READY
    #[error("Dispatch received with no active session")]
    NoSession,

    /// Error surfaced by the delivery queue
    #[error("Delivery queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Connection result type
pub type ConnectionResult<T> = Result<T, ConnectionError>;
