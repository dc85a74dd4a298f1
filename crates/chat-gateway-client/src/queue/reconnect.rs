//! Reconnect requests raised by a queue
//!
//! A queue that can no longer keep its ordering guarantee asks its owner for
//! a full reconnect. The request travels over a channel; the queue never
//! resets itself.

use super::QueueError;
use std::fmt;
use tokio::sync::mpsc;

/// Why a queue asked for a reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconnectReason {
    /// Reordering buffer overflowed under `RequestReconnect`
    BufferOverflow,
    /// Missing sequence never arrived under `RequestReconnect`
    WaitTimeout,
}

impl ReconnectReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BufferOverflow => "BufferOverflow",
            Self::WaitTimeout => "WaitTimeout",
        }
    }
}

impl fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reconnect request with the anomaly that caused it
#[derive(Debug, Clone)]
pub struct ReconnectRequest {
    pub reason: ReconnectReason,
    pub cause: QueueError,
}

/// Sending half handed to a queue at construction
#[derive(Debug, Clone)]
pub struct ReconnectSignal {
    tx: mpsc::UnboundedSender<ReconnectRequest>,
}

impl ReconnectSignal {
    /// Create a signal and the receiver its owner listens on
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReconnectRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Raise a request. Returns false if the owner is gone.
    pub fn raise(&self, reason: ReconnectReason, cause: QueueError) -> bool {
        tracing::warn!(reason = %reason, cause = %cause, "Queue requested gateway reconnect");
        self.tx.send(ReconnectRequest { reason, cause }).is_ok()
    }

    /// Whether the owner dropped its receiver
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
