//! Queue providers
//!
//! A connection is configured with a provider and asks it for a fresh queue
//! each time a session starts.

use super::{
    BufferedQueue, DeliveryQueue, ImmediateQueue, QueueResult, ReconnectSignal, SharedHandler,
};
use chat_common::QueueOptions;
use std::sync::Arc;

/// Builds delivery queues for new gateway sessions
pub trait QueueProvider: Send + Sync {
    /// Create a queue bound to `handler`, reporting reconnect requests on `reconnect`
    fn create(
        &self,
        handler: SharedHandler,
        reconnect: ReconnectSignal,
    ) -> QueueResult<Box<dyn DeliveryQueue>>;

    /// Upper bound of the sequence space the created queues use
    fn max_sequence_number(&self) -> u64;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Provides [`ImmediateQueue`]s
#[derive(Debug, Clone)]
pub struct ImmediateQueueProvider {
    max_sequence_number: u64,
}

impl ImmediateQueueProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_sequence_number: QueueOptions::default().max_sequence_number,
        }
    }

    #[must_use]
    pub fn with_max_sequence_number(max_sequence_number: u64) -> Self {
        Self {
            max_sequence_number,
        }
    }
}

impl Default for ImmediateQueueProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueProvider for ImmediateQueueProvider {
    fn create(
        &self,
        handler: SharedHandler,
        _reconnect: ReconnectSignal,
    ) -> QueueResult<Box<dyn DeliveryQueue>> {
        Ok(Box::new(ImmediateQueue::new(
            handler,
            self.max_sequence_number,
        )?))
    }

    fn max_sequence_number(&self) -> u64 {
        self.max_sequence_number
    }

    fn name(&self) -> &'static str {
        "immediate"
    }
}

/// Provides [`BufferedQueue`]s sharing one set of options
#[derive(Debug, Clone)]
pub struct BufferedQueueProvider {
    options: QueueOptions,
}

impl BufferedQueueProvider {
    /// Validates `options` up front so bad configuration never reaches a session
    pub fn new(options: QueueOptions) -> QueueResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }
}

impl QueueProvider for BufferedQueueProvider {
    fn create(
        &self,
        handler: SharedHandler,
        reconnect: ReconnectSignal,
    ) -> QueueResult<Box<dyn DeliveryQueue>> {
        Ok(Box::new(BufferedQueue::new(
            self.options.clone(),
            handler,
            reconnect,
        )?))
    }

    fn max_sequence_number(&self) -> u64 {
        self.options.max_sequence_number
    }

    fn name(&self) -> &'static str {
        "buffered"
    }
}

/// Pick a provider for `options`: buffered when reordering is enabled,
/// immediate otherwise
pub fn provider_for(options: &QueueOptions) -> QueueResult<Arc<dyn QueueProvider>> {
    if options.enable_buffering {
        Ok(Arc::new(BufferedQueueProvider::new(options.clone())?))
    } else {
        options.validate()?;
        Ok(Arc::new(ImmediateQueueProvider::with_max_sequence_number(
            options.max_sequence_number,
        )))
    }
}
