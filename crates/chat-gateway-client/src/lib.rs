//! # chat-gateway-client
//!
//! Client side of the chat gateway: protocol frames, the connection state
//! machine, and delivery queues that hand dispatch events to the
//! application in sequence order.

pub mod connection;
pub mod protocol;
pub mod queue;

pub use connection::{ConnectionError, ConnectionResult, GatewayConnection};
pub use protocol::{GatewayMessage, RecoveryAction};
pub use queue::{
    handler_fn, provider_for, BufferedQueue, BufferedQueueProvider, DeliveryQueue, EventHandler,
    ImmediateQueue, ImmediateQueueProvider, QueueError, QueueProvider, ReconnectRequest,
    SequencedPayload,
};
