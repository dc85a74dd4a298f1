//! Gateway event delivery queues
//!
//! Dispatch frames carry a wrapping sequence number. A delivery queue sits
//! between the socket reader and the application handler and decides when
//! each payload is released:
//!
//! - [`ImmediateQueue`] hands payloads over in arrival order
//! - [`BufferedQueue`] holds early arrivals in a bounded reordering buffer and
//!   releases them once the gap before them closes, applying the configured
//!   overflow and timeout strategies

mod buffer;
mod buffered;
mod error;
mod handler;
mod immediate;
mod payload;
mod provider;
mod reconnect;
mod sequence;

pub use buffer::{InsertOutcome, ReorderingBuffer};
pub use buffered::BufferedQueue;
pub use error::{QueueError, QueueResult};
pub use handler::{handler_fn, EventHandler, HandlerError, HandlerResult, SharedHandler};
pub use immediate::ImmediateQueue;
pub use payload::SequencedPayload;
pub use provider::{provider_for, BufferedQueueProvider, ImmediateQueueProvider, QueueProvider};
pub use reconnect::{ReconnectReason, ReconnectRequest, ReconnectSignal};
pub use sequence::SequenceSpace;

pub use chat_common::{OverflowStrategy, QueueOptions, TimeoutStrategy};

use async_trait::async_trait;
use serde_json::Value;

/// Ordering contract shared by every queue implementation
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Begin delivering. Payloads accepted earlier are released in order.
    async fn start(&self) -> QueueResult<()>;

    /// Stop delivering and drop anything still buffered. Safe to call twice.
    async fn stop(&self);

    /// Reset the cursor for a new gateway session
    fn start_session(&self, initial_sequence: u64);

    /// Offer a payload received with `sequence`
    ///
    /// Only `BufferOverflow` under the `ThrowException` strategy surfaces
    /// here; every other anomaly is handled inside the queue.
    async fn enqueue(&self, payload: Value, sequence: u64) -> QueueResult<()>;

    /// Sequence the queue will release next
    fn expected_sequence(&self) -> u64;

    /// Newest in-order sequence the handler has finished with
    ///
    /// Starts one before the session's initial sequence. Payloads released
    /// but not yet handled sit after it, so resuming from here never skips
    /// them.
    fn resume_sequence(&self) -> u64;

    fn is_stopped(&self) -> bool;
}
