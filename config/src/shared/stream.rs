use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue {
        field: &'static str,
        constraint: &'static str,
    },
}

/// Change stream consumption configuration.
///
/// Controls the hand-off queue between the change-data-capture engine and the
/// consumer, the consumer's stall detection, and how aggressively the
/// shutdown drain loop polls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamConfig {
    /// Capacity of the bounded hand-off queue between the source engine and
    /// the consumer. Bounds memory usage and provides producer backpressure.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum time, in milliseconds, the consumer waits for a single event
    /// before treating the poll as idle.
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
    /// Number of consecutive idle polls tolerated before the stream fails
    /// with a stall error.
    #[serde(default = "default_max_idle_polls")]
    pub max_idle_polls: u32,
    /// Interval, in milliseconds, between non-blocking drain passes while
    /// shutting the source engine down.
    #[serde(default = "default_drain_poll_ms")]
    pub drain_poll_ms: u64,
}

impl StreamConfig {
    /// Default capacity of the bounded hand-off queue.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

    /// Default idle wait per poll in milliseconds.
    pub const DEFAULT_IDLE_WAIT_MS: u64 = 5_000;

    /// Default number of consecutive idle polls before a stall is declared.
    pub const DEFAULT_MAX_IDLE_POLLS: u32 = 12;

    /// Default drain poll interval in milliseconds.
    pub const DEFAULT_DRAIN_POLL_MS: u64 = 100;

    /// Validates stream configuration settings.
    ///
    /// Ensures the queue has capacity and the stall detection bounds are
    /// non-zero, since a zero idle wait or poll budget would fail every sync
    /// attempt immediately.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "stream.queue_capacity",
                constraint: "must be greater than 0",
            });
        }

        if self.idle_wait_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "stream.idle_wait_ms",
                constraint: "must be greater than 0",
            });
        }

        if self.max_idle_polls == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "stream.max_idle_polls",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }

    /// Returns the idle wait duration for a single consumer poll.
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// Returns the interval between shutdown drain passes.
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            idle_wait_ms: default_idle_wait_ms(),
            max_idle_polls: default_max_idle_polls(),
            drain_poll_ms: default_drain_poll_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    StreamConfig::DEFAULT_QUEUE_CAPACITY
}

fn default_idle_wait_ms() -> u64 {
    StreamConfig::DEFAULT_IDLE_WAIT_MS
}

fn default_max_idle_polls() -> u32 {
    StreamConfig::DEFAULT_MAX_IDLE_POLLS
}

fn default_drain_poll_ms() -> u64 {
    StreamConfig::DEFAULT_DRAIN_POLL_MS
}
