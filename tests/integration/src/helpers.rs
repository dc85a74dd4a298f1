//! Test helpers for integration tests
//!
//! Provides a recording event handler and a scripted client that pushes
//! frames through a `GatewayConnection`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chat_common::QueueOptions;
use chat_gateway_client::connection::GatewayConnection;
use chat_gateway_client::protocol::RecoveryAction;
use chat_gateway_client::queue::{
    provider_for, EventHandler, HandlerResult, QueueProvider, SequencedPayload,
};
use parking_lot::Mutex;

/// A delivered payload, as seen by the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sequence: u64,
    pub event: Option<String>,
}

/// Event handler that records every delivery in order
#[derive(Debug, Default)]
pub struct Recorder {
    deliveries: Mutex<Vec<Delivery>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything delivered so far
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Sequences delivered so far, in delivery order
    pub fn sequences(&self) -> Vec<u64> {
        self.deliveries.lock().iter().map(|d| d.sequence).collect()
    }

    /// Events delivered so far, in delivery order
    pub fn events(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| d.event.clone())
            .collect()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, payload: SequencedPayload) -> HandlerResult<()> {
        let delivery = Delivery {
            sequence: payload.sequence(),
            event: payload.event_type().map(str::to_string),
        };
        self.deliveries.lock().push(delivery);
        Ok(())
    }
}

/// A gateway connection driven by scripted frames
pub struct TestClient {
    pub connection: GatewayConnection,
    pub recorder: Arc<Recorder>,
}

impl TestClient {
    /// Client using the provider `options` select
    pub fn start(options: &QueueOptions) -> Result<Self> {
        Self::start_with_provider(provider_for(options)?)
    }

    pub fn start_with_provider(provider: Arc<dyn QueueProvider>) -> Result<Self> {
        let recorder = Recorder::new();
        let connection = GatewayConnection::new(provider, recorder.clone())?;
        Ok(Self {
            connection,
            recorder,
        })
    }

    /// Push one frame
    pub async fn send(&mut self, frame: &str) -> Result<Option<RecoveryAction>> {
        Ok(self.connection.handle_frame(frame).await?)
    }

    /// Push frames in order, failing on the first rejected one
    pub async fn send_all(&mut self, frames: &[String]) -> Result<()> {
        for frame in frames {
            self.send(frame).await?;
        }
        Ok(())
    }

    /// Let the dispatch worker catch up
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Sequences delivered once the dispatch worker caught up
    pub async fn delivered(&self) -> Vec<u64> {
        self.settle().await;
        self.recorder.sequences()
    }
}

/// Queue options with reordering enabled and a small sequence space
pub fn buffered_options(max_sequence_number: u64, buffer_capacity: usize) -> QueueOptions {
    QueueOptions::buffered()
        .with_max_sequence_number(max_sequence_number)
        .with_buffer_capacity(buffer_capacity)
}
