//! Session and heartbeat bookkeeping

use crate::protocol::ReadyPayload;
use std::time::Duration;
use tokio::time::Instant;

/// An identified gateway session, as announced by READY
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    resume_url: Option<String>,
    /// Last sequence number received on this session
    last_sequence: u64,
}

impl Session {
    pub fn from_ready(ready: ReadyPayload, sequence: u64) -> Self {
        Self {
            id: ready.session_id,
            resume_url: ready.resume_gateway_url,
            last_sequence: sequence,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gateway URL to reconnect to when resuming, if the gateway named one
    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub(crate) fn record(&mut self, sequence: u64) {
        self.last_sequence = sequence;
    }
}

/// Heartbeat state for one socket
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Option<Duration>,
    acked: bool,
    last_sent: Option<Instant>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            interval: None,
            acked: true,
            last_sent: None,
        }
    }

    /// Interval announced by the latest Hello
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub(crate) fn set_interval(&mut self, interval: Duration) {
        self.interval = Some(interval);
    }

    /// Whether the last heartbeat we sent was acknowledged
    pub fn is_acked(&self) -> bool {
        self.acked
    }

    pub(crate) fn sent(&mut self) {
        self.acked = false;
        self.last_sent = Some(Instant::now());
    }

    /// Round-trip time of the heartbeat being acknowledged
    pub(crate) fn ack(&mut self) -> Option<Duration> {
        self.acked = true;
        self.last_sent.take().map(|at| at.elapsed())
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}
