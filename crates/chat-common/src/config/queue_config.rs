//! Gateway delivery queue options
//!
//! Plain options record controlling how dispatch frames are ordered before
//! they reach event handlers. Validated once, immutable afterwards.

use super::ConfigError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Strategy applied when the reordering buffer is full and another
/// out-of-order frame arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowStrategy {
    /// Discard the incoming frame; the buffer is left untouched.
    #[default]
    DropIncoming,
    /// Release the oldest buffered frame out of order to make room.
    ShiftOne,
    /// Fail the `enqueue` call with an overflow error.
    ThrowException,
    /// Ask the owning connection for a full reconnect.
    RequestReconnect,
}

impl OverflowStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropIncoming => "drop_incoming",
            Self::ShiftOne => "shift_one",
            Self::ThrowException => "throw_exception",
            Self::RequestReconnect => "request_reconnect",
        }
    }
}

impl FromStr for OverflowStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drop_incoming" => Ok(Self::DropIncoming),
            "shift_one" => Ok(Self::ShiftOne),
            "throw_exception" => Ok(Self::ThrowException),
            "request_reconnect" => Ok(Self::RequestReconnect),
            _ => Err(ConfigError::InvalidValue("overflow_strategy", s.to_string())),
        }
    }
}

impl fmt::Display for OverflowStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy applied when the wait for a missing sequence times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutStrategy {
    /// Declare the missing frames lost and resume from the oldest buffered one.
    #[default]
    SkipMissing,
    /// Ask the owning connection for a full reconnect.
    RequestReconnect,
}

impl TimeoutStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SkipMissing => "skip_missing",
            Self::RequestReconnect => "request_reconnect",
        }
    }
}

impl FromStr for TimeoutStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "skip_missing" => Ok(Self::SkipMissing),
            "request_reconnect" => Ok(Self::RequestReconnect),
            _ => Err(ConfigError::InvalidValue("timeout_strategy", s.to_string())),
        }
    }
}

impl fmt::Display for TimeoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a gateway delivery queue
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueOptions {
    /// Reorder frames by sequence number. When false every frame is
    /// delivered in arrival order.
    #[serde(default)]
    pub enable_buffering: bool,
    /// Inclusive upper bound of the sequence space; the value after it is 0.
    #[serde(default = "default_max_sequence_number")]
    pub max_sequence_number: u64,
    /// Maximum number of out-of-order frames held back at once.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default)]
    pub overflow_strategy: OverflowStrategy,
    /// How long to wait for a missing sequence. `None` waits forever.
    #[serde(default, rename = "wait_timeout_ms", deserialize_with = "deserialize_millis")]
    pub wait_timeout: Option<Duration>,
    #[serde(default)]
    pub timeout_strategy: TimeoutStrategy,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            enable_buffering: false,
            max_sequence_number: default_max_sequence_number(),
            buffer_capacity: default_buffer_capacity(),
            overflow_strategy: OverflowStrategy::default(),
            wait_timeout: None,
            timeout_strategy: TimeoutStrategy::default(),
        }
    }
}

impl QueueOptions {
    /// Options with reordering turned on and everything else at its default
    #[must_use]
    pub fn buffered() -> Self {
        Self {
            enable_buffering: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_buffering(mut self, enable: bool) -> Self {
        self.enable_buffering = enable;
        self
    }

    #[must_use]
    pub fn with_max_sequence_number(mut self, max: u64) -> Self {
        self.max_sequence_number = max;
        self
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_overflow_strategy(mut self, strategy: OverflowStrategy) -> Self {
        self.overflow_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_timeout_strategy(mut self, strategy: TimeoutStrategy) -> Self {
        self.timeout_strategy = strategy;
        self
    }

    /// Check the options are usable
    ///
    /// # Errors
    /// Returns an error if the buffer capacity or the sequence space is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity < 1 {
            return Err(ConfigError::InvalidValue(
                "buffer_capacity",
                format!("{} (must be at least 1)", self.buffer_capacity),
            ));
        }
        if self.max_sequence_number < 1 {
            return Err(ConfigError::InvalidValue(
                "max_sequence_number",
                format!("{} (must be at least 1)", self.max_sequence_number),
            ));
        }
        Ok(())
    }
}

fn default_max_sequence_number() -> u64 {
    65_535
}

fn default_buffer_capacity() -> usize {
    50
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}
