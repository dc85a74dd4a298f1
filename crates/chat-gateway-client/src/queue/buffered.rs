//! In-memory reordering delivery queue
//!
//! All ordering decisions happen under one lock. Payloads released by those
//! decisions go, in decision order, to a single dispatch worker that awaits
//! the handler for each one in turn. A second worker owns the wait timer and
//! re-checks the deadline under the same lock before acting, so arming,
//! cancelling and firing never race with a drain.

use super::{
    DeliveryQueue, InsertOutcome, QueueError, QueueResult, ReconnectReason, ReconnectSignal,
    ReorderingBuffer, SequenceSpace, SequencedPayload, SharedHandler,
};
use async_trait::async_trait;
use chat_common::{OverflowStrategy, QueueOptions, TimeoutStrategy};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Work item for the dispatch worker
enum Release {
    /// In-order payload; once handled the resume cursor moves to it
    InOrder(SequencedPayload),
    /// Payload forced out ahead of a gap by `ShiftOne`
    Early(SequencedPayload),
    /// The cursor stepped over a sequence already handled as `Early`
    StepOver(u64),
}

impl Release {
    fn carries_payload(&self) -> bool {
        !matches!(self, Self::StepOver(_))
    }
}

/// Mutable queue state, guarded by `Shared::state`
struct QueueState {
    /// Next sequence required to resume in-order delivery
    expected: u64,
    buffer: ReorderingBuffer,
    /// Sequences already released out of order by `ShiftOne`, at most
    /// `buffer_capacity` of them
    released: BTreeSet<u64>,
    wait_deadline: Option<Instant>,
    /// A reconnect was requested; nothing else is accepted
    halted: bool,
    /// Feeds the dispatch worker; `None` once stopped
    deliveries: Option<mpsc::UnboundedSender<Release>>,
}

impl QueueState {
    fn release(&self, release: Release) {
        if let Some(tx) = &self.deliveries {
            if tx.send(release).is_err() {
                tracing::trace!("Dispatch worker gone, release dropped");
            }
        }
    }
}

struct Shared {
    options: QueueOptions,
    space: SequenceSpace,
    state: Mutex<QueueState>,
    stopped: AtomicBool,
    /// Written by the dispatch worker after each in-order handler call
    handled: AtomicU64,
    /// Wakes the timer worker when the deadline changes or the queue stops
    timer: Notify,
    reconnect: ReconnectSignal,
}

impl Shared {
    fn accept(&self, payload: SequencedPayload) -> QueueResult<()> {
        let mut state = self.state.lock();

        if self.stopped.load(Ordering::SeqCst) || state.halted {
            tracing::trace!(sequence = payload.sequence(), "Queue inactive, frame ignored");
            return Ok(());
        }

        let sequence = payload.sequence();

        if !self.options.enable_buffering {
            self.deliver(&mut state, payload);
            return Ok(());
        }

        if !self.space.contains(sequence) {
            tracing::warn!(
                sequence,
                max = self.space.max(),
                "Sequence outside of sequence space, frame discarded"
            );
            return Ok(());
        }

        if self.space.is_older(sequence, state.expected) {
            tracing::debug!(sequence, expected = state.expected, "Stale frame discarded");
            return Ok(());
        }

        if sequence == state.expected {
            tracing::trace!(sequence, "Delivering in-order frame");
            self.deliver(&mut state, payload);
            self.drain(&mut state);
            return Ok(());
        }

        if state.released.contains(&sequence) {
            tracing::debug!(sequence, "Frame already released, discarded");
            return Ok(());
        }

        if state.buffer.contains(sequence) {
            tracing::debug!(sequence, "Duplicate buffered frame discarded");
            return Ok(());
        }

        if state.buffer.is_full() {
            return self.overflow(&mut state, payload);
        }

        if state.buffer.insert(payload) == InsertOutcome::Inserted {
            tracing::trace!(
                sequence,
                expected = state.expected,
                buffered = state.buffer.len(),
                "Frame buffered while waiting for gap"
            );
            if state.wait_deadline.is_none() {
                self.arm_timer(&mut state);
            }
        }
        Ok(())
    }

    fn deliver(&self, state: &mut QueueState, payload: SequencedPayload) {
        state.release(Release::InOrder(payload));
        state.expected = self.space.next(state.expected);
    }

    /// Move the resume cursor forward to `sequence`, never back
    fn record_handled(&self, sequence: u64) {
        let handled = self.handled.load(Ordering::SeqCst);
        if self.space.contains(sequence) && !self.space.is_older(sequence, handled) {
            self.handled.store(sequence, Ordering::SeqCst);
        }
    }

    /// Deliver every buffered frame that is now contiguous with `expected`
    fn drain(&self, state: &mut QueueState) {
        loop {
            let expected = state.expected;

            if state.released.remove(&expected) {
                state.release(Release::StepOver(expected));
                state.expected = self.space.next(expected);
                continue;
            }

            let ready = state
                .buffer
                .peek_oldest(expected)
                .is_some_and(|p| p.sequence() == expected);
            if !ready {
                break;
            }

            if let Some(payload) = state.buffer.pop_oldest(expected) {
                tracing::trace!(sequence = expected, "Draining buffered frame");
                self.deliver(state, payload);
            }
        }

        if state.buffer.is_empty() {
            self.disarm_timer(state);
        } else {
            self.arm_timer(state);
        }
    }

    fn overflow(&self, state: &mut QueueState, payload: SequencedPayload) -> QueueResult<()> {
        let sequence = payload.sequence();
        let capacity = state.buffer.capacity();

        match self.options.overflow_strategy {
            OverflowStrategy::DropIncoming => {
                tracing::warn!(
                    sequence,
                    expected = state.expected,
                    capacity,
                    "Reordering buffer full, incoming frame dropped"
                );
                Ok(())
            }
            OverflowStrategy::ShiftOne => {
                if let Some(oldest) = state.buffer.pop_oldest(state.expected) {
                    tracing::warn!(
                        released = oldest.sequence(),
                        expected = state.expected,
                        "Reordering buffer full, releasing oldest frame out of order"
                    );
                    state.released.insert(oldest.sequence());
                    state.release(Release::Early(oldest));
                }
                state.buffer.insert(payload);
                self.abandon_gaps(state);
                Ok(())
            }
            OverflowStrategy::ThrowException => Err(QueueError::BufferOverflow {
                sequence,
                expected: state.expected,
                capacity,
            }),
            OverflowStrategy::RequestReconnect => {
                let cause = QueueError::BufferOverflow {
                    sequence,
                    expected: state.expected,
                    capacity,
                };
                self.halt(state, ReconnectReason::BufferOverflow, cause);
                Ok(())
            }
        }
    }

    /// Give up on missing frames until the markers fit in `buffer_capacity`
    ///
    /// Each round moves the cursor to the nearest held-back frame or marker,
    /// which the drain then consumes.
    fn abandon_gaps(&self, state: &mut QueueState) {
        let space = self.space;
        while state.released.len() > state.buffer.capacity() {
            let expected = state.expected;
            let marker = state
                .released
                .iter()
                .copied()
                .min_by_key(|s| space.gap(expected, *s));
            let buffered = state.buffer.peek_oldest(expected).map(SequencedPayload::sequence);
            let Some(resume_at) = marker
                .into_iter()
                .chain(buffered)
                .min_by_key(|s| space.gap(expected, *s))
            else {
                return;
            };

            tracing::warn!(
                expected,
                resume_at,
                skipped = space.gap(expected, resume_at),
                markers = state.released.len(),
                "Too many frames released out of order, giving up on missing frames"
            );
            state.expected = resume_at;
            self.drain(state);
        }
    }

    /// Called by the timer worker; acts only if the armed deadline has passed
    fn on_deadline(&self) {
        let mut state = self.state.lock();

        if self.stopped.load(Ordering::SeqCst) || state.halted {
            return;
        }
        match state.wait_deadline {
            Some(at) if at <= Instant::now() => state.wait_deadline = None,
            _ => return,
        }

        let Some(oldest) = state.buffer.peek_oldest(state.expected).map(SequencedPayload::sequence)
        else {
            return;
        };

        match self.options.timeout_strategy {
            TimeoutStrategy::SkipMissing => {
                tracing::warn!(
                    expected = state.expected,
                    resume_at = oldest,
                    skipped = self.space.gap(state.expected, oldest),
                    "Gave up waiting for missing frames"
                );
                state.expected = oldest;
                let space = self.space;
                state.released.retain(|s| !space.is_older(*s, oldest));
                self.drain(&mut state);
            }
            TimeoutStrategy::RequestReconnect => {
                let cause = QueueError::WaitTimeout {
                    expected: state.expected,
                    waited: self.options.wait_timeout.unwrap_or_default(),
                    buffered: state.buffer.len(),
                };
                self.halt(&mut state, ReconnectReason::WaitTimeout, cause);
            }
        }
    }

    fn halt(&self, state: &mut QueueState, reason: ReconnectReason, cause: QueueError) {
        state.halted = true;
        state.wait_deadline = None;
        self.timer.notify_one();
        self.reconnect.raise(reason, cause);
    }

    fn arm_timer(&self, state: &mut QueueState) {
        if let Some(timeout) = self.options.wait_timeout {
            state.wait_deadline = Some(Instant::now() + timeout);
            self.timer.notify_one();
        }
    }

    fn disarm_timer(&self, state: &mut QueueState) {
        if state.wait_deadline.take().is_some() {
            self.timer.notify_one();
        }
    }

    fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        state.wait_deadline = None;
        state.deliveries = None;
        state.buffer.clear();
        state.released.clear();
        self.timer.notify_one();
        true
    }
}

/// Reordering queue that delivers payloads strictly in sequence order
pub struct BufferedQueue {
    shared: Arc<Shared>,
    handler: SharedHandler,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Release>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BufferedQueue {
    /// Create a queue; fails if `options` are invalid
    pub fn new(
        options: QueueOptions,
        handler: SharedHandler,
        reconnect: ReconnectSignal,
    ) -> QueueResult<Self> {
        options.validate()?;
        let space = SequenceSpace::new(options.max_sequence_number)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let state = QueueState {
            expected: 0,
            buffer: ReorderingBuffer::new(options.buffer_capacity),
            released: BTreeSet::new(),
            wait_deadline: None,
            halted: false,
            deliveries: Some(tx),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                options,
                space,
                state: Mutex::new(state),
                stopped: AtomicBool::new(false),
                handled: AtomicU64::new(space.prev(0)),
                timer: Notify::new(),
                reconnect,
            }),
            handler,
            receiver: Mutex::new(Some(rx)),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Options this queue was built with
    pub fn options(&self) -> &QueueOptions {
        &self.shared.options
    }

    /// Number of frames currently held back
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Whether a reconnect request has been raised
    pub fn is_halted(&self) -> bool {
        self.shared.state.lock().halted
    }

    async fn dispatch_loop(
        shared: Arc<Shared>,
        handler: SharedHandler,
        mut rx: mpsc::UnboundedReceiver<Release>,
    ) {
        while let Some(release) = rx.recv().await {
            if shared.stopped.load(Ordering::SeqCst) {
                let mut discarded = usize::from(release.carries_payload());
                while let Ok(rest) = rx.try_recv() {
                    discarded += usize::from(rest.carries_payload());
                }
                if discarded > 0 {
                    tracing::debug!(discarded, "Queue stopped, released payloads discarded");
                }
                break;
            }

            match release {
                Release::InOrder(payload) => {
                    let sequence = payload.sequence();
                    Self::handle(&handler, payload).await;
                    shared.record_handled(sequence);
                }
                Release::Early(payload) => Self::handle(&handler, payload).await,
                Release::StepOver(sequence) => shared.record_handled(sequence),
            }
        }
        tracing::debug!("Dispatch worker ended");
    }

    async fn handle(handler: &SharedHandler, payload: SequencedPayload) {
        let sequence = payload.sequence();
        if let Err(e) = handler.handle(payload).await {
            tracing::warn!(sequence, error = %e, "Event handler failed");
        }
    }

    async fn timer_loop(shared: Arc<Shared>) {
        loop {
            let deadline = {
                let state = shared.state.lock();
                if shared.stopped.load(Ordering::SeqCst) || state.halted {
                    break;
                }
                state.wait_deadline
            };

            match deadline {
                Some(at) => {
                    tokio::select! {
                        () = tokio::time::sleep_until(at) => shared.on_deadline(),
                        () = shared.timer.notified() => {}
                    }
                }
                None => shared.timer.notified().await,
            }
        }
        tracing::debug!("Wait timer worker ended");
    }
}

#[async_trait]
impl DeliveryQueue for BufferedQueue {
    async fn start(&self) -> QueueResult<()> {
        let Some(rx) = self.receiver.lock().take() else {
            tracing::warn!("Delivery queue is already running");
            return Ok(());
        };
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let dispatch = tokio::spawn(Self::dispatch_loop(
            self.shared.clone(),
            self.handler.clone(),
            rx,
        ));
        let timer = tokio::spawn(Self::timer_loop(self.shared.clone()));
        self.workers.lock().extend([dispatch, timer]);

        tracing::info!(
            buffering = self.shared.options.enable_buffering,
            capacity = self.shared.options.buffer_capacity,
            overflow = %self.shared.options.overflow_strategy,
            timeout = %self.shared.options.timeout_strategy,
            "Delivery queue started"
        );
        Ok(())
    }

    async fn stop(&self) {
        if self.shared.shutdown() {
            self.receiver.lock().take();
            // Workers exit on their own; a handler call in flight is left to complete
            self.workers.lock().clear();
            tracing::info!("Delivery queue stopped");
        }
    }

    fn start_session(&self, initial_sequence: u64) {
        let space = self.shared.space;
        let mut state = self.shared.state.lock();

        let initial = space.wrap(initial_sequence);
        if initial != initial_sequence {
            tracing::warn!(
                initial_sequence,
                max = space.max(),
                "Initial sequence outside of sequence space, wrapping"
            );
        }

        state.expected = initial;
        self.shared.handled.store(space.prev(initial), Ordering::SeqCst);
        state.buffer.clear();
        state.released.clear();
        if state.wait_deadline.take().is_some() {
            self.shared.timer.notify_one();
        }

        tracing::debug!(expected = initial, "Delivery queue session started");
    }

    async fn enqueue(&self, payload: Value, sequence: u64) -> QueueResult<()> {
        self.shared.accept(SequencedPayload::new(sequence, payload))
    }

    fn expected_sequence(&self) -> u64 {
        self.shared.state.lock().expected
    }

    fn resume_sequence(&self) -> u64 {
        self.shared.handled.load(Ordering::SeqCst)
    }

    fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for BufferedQueue {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
