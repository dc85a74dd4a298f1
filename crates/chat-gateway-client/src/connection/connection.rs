//! Client side of one gateway connection
//!
//! Owns the session, the heartbeat bookkeeping and the delivery queue of the
//! current session. The transport feeds it raw frames and close codes and
//! acts on the [`RecoveryAction`]s it returns; it never touches the socket
//! itself.

use super::{ConnectionError, ConnectionResult, Heartbeat, Session};
use crate::protocol::{
    CloseCode, GatewayMessage, IdentifyProperties, OpCode, RecoveryAction, ResumePayload,
    READY_EVENT,
};
use crate::queue::{
    DeliveryQueue, QueueProvider, ReconnectRequest, ReconnectSignal, SequenceSpace, SharedHandler,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// State machine for one logical gateway connection
pub struct GatewayConnection {
    provider: Arc<dyn QueueProvider>,
    handler: SharedHandler,
    space: SequenceSpace,
    session: Option<Session>,
    heartbeat: Heartbeat,
    queue: Option<Box<dyn DeliveryQueue>>,
    /// Reconnect requests of the current queue only
    reconnect_rx: Option<mpsc::UnboundedReceiver<ReconnectRequest>>,
}

impl GatewayConnection {
    pub fn new(provider: Arc<dyn QueueProvider>, handler: SharedHandler) -> ConnectionResult<Self> {
        let space = SequenceSpace::new(provider.max_sequence_number())?;
        tracing::debug!(provider = provider.name(), "Gateway connection created");

        Ok(Self {
            provider,
            handler,
            space,
            session: None,
            heartbeat: Heartbeat::new(),
            queue: None,
            reconnect_rx: None,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// Queue of the current session
    pub fn queue(&self) -> Option<&dyn DeliveryQueue> {
        self.queue.as_deref()
    }

    /// Handle one text frame from the gateway
    ///
    /// Returns the recovery the transport must perform, if any.
    pub async fn handle_frame(&mut self, frame: &str) -> ConnectionResult<Option<RecoveryAction>> {
        let raw: Value = serde_json::from_str(frame)?;
        let message = GatewayMessage::deserialize(&raw)?;

        match message.op {
            OpCode::Dispatch => {
                self.dispatch(&message, raw).await?;
                Ok(None)
            }
            OpCode::Hello => {
                let hello = message
                    .as_hello()
                    .ok_or(ConnectionError::MalformedPayload(OpCode::Hello))?;
                let interval = Duration::from_millis(hello.heartbeat_interval);
                tracing::debug!(interval_ms = hello.heartbeat_interval, "Gateway hello");
                self.heartbeat.set_interval(interval);
                Ok(None)
            }
            OpCode::HeartbeatAck => {
                if let Some(rtt) = self.heartbeat.ack() {
                    tracing::trace!(rtt_ms = rtt.as_millis(), "Heartbeat acknowledged");
                }
                Ok(None)
            }
            OpCode::Heartbeat => {
                tracing::debug!("Gateway requested an immediate heartbeat");
                Ok(None)
            }
            OpCode::Reconnect => {
                tracing::info!("Gateway requested reconnect");
                Ok(Some(RecoveryAction::Resume))
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                tracing::warn!(resumable, "Gateway invalidated the session");
                if resumable {
                    Ok(Some(RecoveryAction::Resume))
                } else {
                    self.discard_session().await;
                    Ok(Some(RecoveryAction::FullReconnect))
                }
            }
            op @ (OpCode::Identify | OpCode::PresenceUpdate | OpCode::Resume) => {
                tracing::warn!(op = %op, "Ignoring client-only op sent by gateway");
                Ok(None)
            }
        }
    }

    async fn dispatch(&mut self, message: &GatewayMessage, raw: Value) -> ConnectionResult<()> {
        let event = message.t.as_deref().unwrap_or_default();
        let sequence = message.s.ok_or_else(|| ConnectionError::MissingSequence {
            event: event.to_string(),
        })?;

        if message.is_event(READY_EVENT) {
            let ready = message
                .as_ready()
                .ok_or(ConnectionError::MalformedPayload(OpCode::Dispatch))?;
            self.discard_session().await;
            self.open_queue(sequence).await?;
            tracing::info!(session_id = %ready.session_id, sequence, "Gateway session ready");
            self.session = Some(Session::from_ready(ready, sequence));
        }

        let queue = self.queue.as_ref().ok_or(ConnectionError::NoSession)?;
        if let Some(session) = self.session.as_mut() {
            if self.space.is_older(session.last_sequence(), sequence) {
                session.record(sequence);
            }
        }

        tracing::trace!(event, sequence, "Dispatch received");
        queue.enqueue(raw, sequence).await?;
        Ok(())
    }

    /// Recovery after the gateway closed the socket with `code`
    pub async fn handle_close(&mut self, code: u16) -> RecoveryAction {
        let action = match CloseCode::from_u16(code) {
            Some(close) => {
                tracing::warn!(code, reason = %close, "Gateway closed the connection");
                close.recovery()
            }
            None => {
                tracing::warn!(code, "Gateway closed the connection with an unknown code");
                RecoveryAction::Resume
            }
        };

        if !action.keeps_session() {
            self.discard_session().await;
        }
        action
    }

    /// Wait for the current queue to ask for a reconnect
    ///
    /// On return the queue and session are gone and the transport must
    /// perform a [`RecoveryAction::FullReconnect`]. Never resolves while
    /// there is no queue, so it can sit in a `select!` next to the socket.
    pub async fn next_reconnect_request(&mut self) -> ReconnectRequest {
        let request = match self.reconnect_rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };

        match request {
            Some(request) => {
                self.abandon(&request).await;
                request
            }
            None => std::future::pending().await,
        }
    }

    /// Non-blocking form of [`next_reconnect_request`](Self::next_reconnect_request)
    pub async fn try_reconnect_request(&mut self) -> Option<ReconnectRequest> {
        let request = self.reconnect_rx.as_mut()?.try_recv().ok()?;
        self.abandon(&request).await;
        Some(request)
    }

    async fn abandon(&mut self, request: &ReconnectRequest) {
        tracing::warn!(
            reason = %request.reason,
            cause = %request.cause,
            "Dropping session for full reconnect"
        );
        self.discard_session().await;
    }

    /// Prepare to resume the current session on a new socket
    ///
    /// Stops the old queue and resumes after the newest sequence its handler
    /// finished with in order. Frames still held back or not yet handled are
    /// replayed by the gateway into a fresh queue.
    pub async fn begin_resume(
        &mut self,
        token: impl Into<String>,
    ) -> ConnectionResult<Option<ResumePayload>> {
        if self.try_reconnect_request().await.is_some() {
            return Ok(None);
        }
        let Some(session_id) = self.session.as_ref().map(|s| s.id().to_string()) else {
            return Ok(None);
        };
        let Some(old) = self.queue.take() else {
            return Ok(None);
        };

        old.stop().await;
        let seq = old.resume_sequence();

        self.open_queue(self.space.next(seq)).await?;
        tracing::info!(session_id = %session_id, seq, "Resuming gateway session");

        Ok(Some(ResumePayload {
            token: token.into(),
            session_id,
            seq,
        }))
    }

    /// Identify frame for a new session
    pub fn identify_message(
        &self,
        token: impl Into<String>,
        properties: Option<IdentifyProperties>,
    ) -> ConnectionResult<GatewayMessage> {
        Ok(GatewayMessage::identify(token, properties)?)
    }

    /// Heartbeat frame carrying the last sequence received
    pub fn heartbeat_message(&mut self) -> GatewayMessage {
        if !self.heartbeat.is_acked() {
            tracing::warn!("Previous heartbeat was never acknowledged");
        }
        self.heartbeat.sent();
        GatewayMessage::heartbeat(self.session.as_ref().map(Session::last_sequence))
    }

    /// Stop the current queue. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.stop().await;
            tracing::info!("Gateway connection shut down");
        }
        self.reconnect_rx = None;
    }

    async fn open_queue(&mut self, initial_sequence: u64) -> ConnectionResult<()> {
        let (signal, rx) = ReconnectSignal::channel();
        let queue = self.provider.create(self.handler.clone(), signal)?;
        queue.start().await?;
        queue.start_session(initial_sequence);

        self.queue = Some(queue);
        self.reconnect_rx = Some(rx);
        Ok(())
    }

    async fn discard_session(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.stop().await;
        }
        self.reconnect_rx = None;
        if let Some(session) = self.session.take() {
            tracing::debug!(session_id = %session.id(), "Session discarded");
        }
    }
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("provider", &self.provider.name())
            .field("session", &self.session)
            .field("heartbeat", &self.heartbeat)
            .field("queue", &self.queue.is_some())
            .finish_non_exhaustive()
    }
}
