//! Reordering buffer
//!
//! Holds frames that arrived ahead of the sequence the queue is waiting for.
//! "Oldest" is always relative to an anchor (the queue's expected sequence),
//! because after a wrap the smallest key is not the oldest frame.

use super::SequencedPayload;
use std::collections::BTreeMap;

/// Outcome of [`ReorderingBuffer::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Frame stored
    Inserted,
    /// A frame with this sequence is already buffered
    Duplicate,
    /// Buffer at capacity; the frame was not stored
    Full,
}

/// Bounded map of out-of-order frames keyed by sequence number
#[derive(Debug)]
pub struct ReorderingBuffer {
    entries: BTreeMap<u64, SequencedPayload>,
    capacity: usize,
}

impl ReorderingBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
        }
    }

    pub fn insert(&mut self, payload: SequencedPayload) -> InsertOutcome {
        if self.entries.contains_key(&payload.sequence()) {
            return InsertOutcome::Duplicate;
        }
        if self.is_full() {
            return InsertOutcome::Full;
        }
        self.entries.insert(payload.sequence(), payload);
        InsertOutcome::Inserted
    }

    /// Oldest buffered frame in circular order starting at `anchor`
    #[must_use]
    pub fn peek_oldest(&self, anchor: u64) -> Option<&SequencedPayload> {
        self.entries
            .range(anchor..)
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(_, payload)| payload)
    }

    pub fn pop_oldest(&mut self, anchor: u64) -> Option<SequencedPayload> {
        let sequence = self.peek_oldest(anchor)?.sequence();
        self.entries.remove(&sequence)
    }

    #[must_use]
    pub fn contains(&self, sequence: u64) -> bool {
        self.entries.contains_key(&sequence)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
