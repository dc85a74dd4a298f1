//! Bufferless delivery queue
//!
//! Calls the handler inline from `enqueue`, so delivery order is call order.

use super::{DeliveryQueue, QueueResult, SequenceSpace, SequencedPayload, SharedHandler};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Pass-through queue with no reordering
pub struct ImmediateQueue {
    handler: SharedHandler,
    space: SequenceSpace,
    expected: AtomicU64,
    /// Newest sequence handled; arrivals are not ordered, so older ones never move it back
    handled: AtomicU64,
    stopped: AtomicBool,
    /// Serializes handler calls if `enqueue` is ever called concurrently
    dispatch: Mutex<()>,
}

impl ImmediateQueue {
    pub fn new(handler: SharedHandler, max_sequence_number: u64) -> QueueResult<Self> {
        let space = SequenceSpace::new(max_sequence_number)?;
        Ok(Self {
            handler,
            space,
            expected: AtomicU64::new(0),
            handled: AtomicU64::new(space.prev(0)),
            stopped: AtomicBool::new(false),
            dispatch: Mutex::new(()),
        })
    }
}

#[async_trait]
impl DeliveryQueue for ImmediateQueue {
    async fn start(&self) -> QueueResult<()> {
        tracing::debug!("Immediate delivery queue started");
        Ok(())
    }

    async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!("Immediate delivery queue stopped");
        }
    }

    fn start_session(&self, initial_sequence: u64) {
        let initial = self.space.wrap(initial_sequence);
        if initial != initial_sequence {
            tracing::warn!(
                initial_sequence,
                max = self.space.max(),
                "Initial sequence outside of sequence space, wrapping"
            );
        }
        self.expected.store(initial, Ordering::SeqCst);
        self.handled.store(self.space.prev(initial), Ordering::SeqCst);
    }

    async fn enqueue(&self, payload: Value, sequence: u64) -> QueueResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let _guard = self.dispatch.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self
            .handler
            .handle(SequencedPayload::new(sequence, payload))
            .await
        {
            tracing::warn!(sequence, error = %e, "Event handler failed");
        }

        let handled = self.handled.load(Ordering::SeqCst);
        if self.space.contains(sequence) && !self.space.is_older(sequence, handled) {
            self.handled.store(sequence, Ordering::SeqCst);
        }

        let expected = self.expected.load(Ordering::SeqCst);
        self.expected.store(self.space.next(expected), Ordering::SeqCst);
        Ok(())
    }

    fn expected_sequence(&self) -> u64 {
        self.expected.load(Ordering::SeqCst)
    }

    fn resume_sequence(&self) -> u64 {
        self.handled.load(Ordering::SeqCst)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{handler_fn, HandlerError};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn queue() -> (ImmediateQueue, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = handler_fn(move |payload: SequencedPayload| {
            let tx = tx.clone();
            async move {
                tx.send(payload.sequence())
                    .map_err(|e| HandlerError::Internal(e.to_string()))
            }
        });
        (ImmediateQueue::new(handler, 9).unwrap(), rx)
    }

    #[tokio::test]
    async fn test_delivers_in_call_order() {
        let (queue, mut rx) = queue();
        queue.start().await.unwrap();
        queue.start_session(8);

        for seq in [9, 8, 0, 0] {
            queue.enqueue(json!({}), seq).await.unwrap();
        }

        let mut seen = Vec::new();
        while let Ok(seq) = rx.try_recv() {
            seen.push(seq);
        }
        assert_eq!(seen, vec![9, 8, 0, 0]);
        assert_eq!(queue.expected_sequence(), 2);
    }

    #[tokio::test]
    async fn test_resume_sequence_tracks_newest_handled() {
        let (queue, _rx) = queue();
        queue.start_session(1);
        assert_eq!(queue.resume_sequence(), 0);

        // A gap in pass-through mode moves the cursor to the newest sequence
        for seq in [1, 5, 3] {
            queue.enqueue(json!({}), seq).await.unwrap();
        }
        assert_eq!(queue.resume_sequence(), 5);
        assert_eq!(queue.expected_sequence(), 4);

        queue.enqueue(json!({}), 42).await.unwrap();
        assert_eq!(queue.resume_sequence(), 5);
    }

    #[tokio::test]
    async fn test_out_of_range_session_start_wraps() {
        let (queue, _rx) = queue();
        queue.start_session(23);

        assert_eq!(queue.expected_sequence(), 3);
        assert_eq!(queue.resume_sequence(), 2);
    }

    #[tokio::test]
    async fn test_stop_twice_then_enqueue() {
        let (queue, mut rx) = queue();
        queue.start().await.unwrap();

        queue.stop().await;
        queue.stop().await;
        queue.enqueue(json!({}), 0).await.unwrap();

        assert!(queue.is_stopped());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejects_empty_sequence_space() {
        let handler = handler_fn(|_payload: SequencedPayload| async { Ok(()) });
        assert!(ImmediateQueue::new(handler, 0).is_err());
    }
}
