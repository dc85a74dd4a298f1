//! Queue error types

use chat_common::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Delivery queue error type
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Options rejected at construction time
    #[error("Invalid queue options: {0}")]
    InvalidOptions(String),

    /// Reordering buffer full while waiting for a missing sequence
    #[error("Reordering buffer full ({capacity} entries): cannot hold sequence {sequence} while waiting for {expected}")]
    BufferOverflow {
        sequence: u64,
        expected: u64,
        capacity: usize,
    },

    /// Missing sequence did not arrive in time
    #[error("Timed out after {waited:?} waiting for sequence {expected} ({buffered} frames held back)")]
    WaitTimeout {
        expected: u64,
        waited: Duration,
        buffered: usize,
    },
}

impl From<ConfigError> for QueueError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidOptions(err.to_string())
    }
}

/// Queue result type
pub type QueueResult<T> = Result<T, QueueError>;
