//! Gateway message format

use super::{HelloPayload, IdentifyPayload, IdentifyProperties, OpCode, ReadyPayload, ResumePayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of the dispatch that opens a session
pub const READY_EVENT: &str = "READY";

/// Event name of the dispatch that confirms a resume
pub const RESUMED_EVENT: &str = "RESUMED";

/// Envelope shared by every frame on the gateway socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: OpCode,

    /// Event name (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl GatewayMessage {
    // === Client frames ===

    /// Identify frame (op=2)
    pub fn identify(
        token: impl Into<String>,
        properties: Option<IdentifyProperties>,
    ) -> Result<Self, serde_json::Error> {
        let payload = IdentifyPayload {
            token: token.into(),
            properties,
        };
        Ok(Self::control(OpCode::Identify, Some(serde_json::to_value(payload)?)))
    }

    /// Resume frame (op=4)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::control(OpCode::Resume, Some(serde_json::to_value(payload)?)))
    }

    /// Heartbeat frame (op=1) carrying the last sequence received
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    /// Dispatch frame (op=0), used to build replay input and fixtures
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_type.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    fn control(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            t: None,
            s: None,
            d,
        }
    }

    // === Parsing gateway frames ===

    /// Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        self.payload_for(OpCode::Hello)
    }

    /// READY payload (op=0, t=READY)
    pub fn as_ready(&self) -> Option<ReadyPayload> {
        if self.t.as_deref() != Some(READY_EVENT) {
            return None;
        }
        self.payload_for(OpCode::Dispatch)
    }

    /// Resumable flag of an Invalid Session frame (op=7); absent means false
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    fn payload_for<T: DeserializeOwned>(&self, op: OpCode) -> Option<T> {
        if self.op != op {
            return None;
        }
        self.d
            .as_ref()
            .and_then(|d| T::deserialize(d).ok())
    }

    /// Whether this is a dispatch with the given event name
    #[must_use]
    pub fn is_event(&self, name: &str) -> bool {
        self.op == OpCode::Dispatch && self.t.as_deref() == Some(name)
    }

    // === Utilities ===

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
