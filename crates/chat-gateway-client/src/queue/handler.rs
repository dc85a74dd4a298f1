//! Event handler contract
//!
//! The queue calls exactly one handler per instance, once per released
//! payload, in release order.

use super::SequencedPayload;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload could not be interpreted
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Receives gateway payloads in sequence order
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, payload: SequencedPayload) -> HandlerResult<()>;
}

/// Shared handler reference held by a queue
pub type SharedHandler = Arc<dyn EventHandler>;

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(SequencedPayload) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync + 'static,
{
    async fn handle(&self, payload: SequencedPayload) -> HandlerResult<()> {
        (self.f)(payload).await
    }
}

/// Wrap an async closure as an [`EventHandler`]
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(SequencedPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        f: move |payload: SequencedPayload| -> BoxFuture<'static, HandlerResult<()>> {
            Box::pin(f(payload))
        },
    })
}
