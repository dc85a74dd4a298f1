//! Gateway frame fixtures
//!
//! Raw JSON text frames, as they would arrive on the socket.

use chat_gateway_client::protocol::{GatewayMessage, READY_EVENT, RESUMED_EVENT};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique session ids
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique session id
pub fn unique_session_id() -> String {
    format!("session-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

pub fn hello(heartbeat_interval: u64) -> String {
    json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}}).to_string()
}

pub fn heartbeat_ack() -> String {
    json!({"op": 11}).to_string()
}

pub fn reconnect() -> String {
    json!({"op": 5}).to_string()
}

pub fn invalid_session(resumable: bool) -> String {
    json!({"op": 7, "d": resumable}).to_string()
}

pub fn ready(session_id: &str, sequence: u64) -> String {
    frame(&GatewayMessage::dispatch(
        READY_EVENT,
        sequence,
        json!({"v": 1, "session_id": session_id, "user": {"id": "1"}}),
    ))
}

pub fn resumed(sequence: u64) -> String {
    frame(&GatewayMessage::dispatch(RESUMED_EVENT, sequence, json!({})))
}

/// A MESSAGE_CREATE dispatch whose content names its sequence
pub fn message_create(sequence: u64) -> String {
    frame(&GatewayMessage::dispatch(
        "MESSAGE_CREATE",
        sequence,
        json!({"content": format!("message {sequence}")}),
    ))
}

/// Dispatch frames for `sequences`, in the given order
pub fn message_stream(sequences: &[u64]) -> Vec<String> {
    sequences.iter().copied().map(message_create).collect()
}

/// Dispatch frame with no `s` field
pub fn unsequenced(event: &str) -> String {
    json!({"op": 0, "t": event, "d": Value::Null}).to_string()
}

fn frame(message: &GatewayMessage) -> String {
    message.to_json().unwrap_or_default()
}
