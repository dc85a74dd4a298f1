//! Wrapping sequence number arithmetic
//!
//! Sequence numbers live in `[0, max]` and wrap to 0 after `max`. Ordering is
//! decided the way TCP does it: of the two directions around the circle, the
//! shorter one wins.

use super::{QueueError, QueueResult};
use std::cmp::Ordering;

/// A bounded, wrapping sequence number range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSpace {
    max: u64,
}

impl SequenceSpace {
    /// Create a space covering `[0, max]`
    pub fn new(max: u64) -> QueueResult<Self> {
        if max < 1 {
            return Err(QueueError::InvalidOptions(format!(
                "max_sequence_number must be at least 1, got {max}"
            )));
        }
        Ok(Self { max })
    }

    /// Inclusive upper bound
    #[must_use]
    pub const fn max(self) -> u64 {
        self.max
    }

    /// Whether `value` is a valid sequence number in this space
    #[must_use]
    pub const fn contains(self, value: u64) -> bool {
        value <= self.max
    }

    /// `value` folded into the space, modulo `max + 1`
    #[must_use]
    pub const fn wrap(self, value: u64) -> u64 {
        if self.contains(value) {
            value
        } else {
            // max < value, so max + 1 cannot overflow
            value % (self.max + 1)
        }
    }

    /// The sequence number following `value`
    #[must_use]
    pub const fn next(self, value: u64) -> u64 {
        if value >= self.max {
            0
        } else {
            value + 1
        }
    }

    /// The sequence number preceding `value`
    #[must_use]
    pub const fn prev(self, value: u64) -> u64 {
        if value == 0 || value > self.max {
            self.max
        } else {
            value - 1
        }
    }

    /// Forward steps from `from` to `to`
    #[must_use]
    pub const fn gap(self, from: u64, to: u64) -> u64 {
        if to >= from {
            to - from
        } else {
            // (max - from) + to + 1 never exceeds max since to < from
            self.max - from + to + 1
        }
    }

    /// Whether `a` comes before `b` in circular order
    ///
    /// An exact half-space tie is not older in either direction.
    #[must_use]
    pub fn is_older(self, a: u64, b: u64) -> bool {
        let forward = self.gap(a, b);
        forward != 0 && u128::from(forward) * 2 < self.size()
    }

    /// Circular comparison of `a` against `b`
    #[must_use]
    pub fn compare(self, a: u64, b: u64) -> Ordering {
        if a == b {
            Ordering::Equal
        } else if self.is_older(a, b) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    fn size(self) -> u128 {
        u128::from(self.max) + 1
    }
}
