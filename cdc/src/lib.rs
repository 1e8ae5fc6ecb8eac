//! Change stream consumption for externally managed CDC engines.
//!
//! This crate sits between a continuously running change-data-capture engine
//! and a single pull-based consumer. The engine publishes [`ChangeEvent`]s
//! into a bounded hand-off queue; the consumer pulls them through a
//! [`ChangeStream`], which decides, event by event, whether replication has
//! caught up to a target position captured at sync start and then stops the
//! engine without losing anything already produced.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────┐   bounded queue    ┌──────────────┐
//! │  CDC engine  │ ─────────────────► │ ChangeStream │ ──► consumer
//! └──────────────┘                    └──────┬───────┘
//!        ▲                                   │ target reached / cancelled
//!        │ stop (once)               ┌───────▼──────────┐
//!        └────────────────────────── │ ShutdownCoordin. │ ──► residual buffer
//!                                    └──────────────────┘
//! ```
//!
//! The hard part is the shutdown window: the engine's producer task may be
//! blocked on a full queue at the exact moment the consumer decides to stop
//! reading. The [`concurrency::shutdown`] module keeps draining the queue
//! with non-blocking polls while the engine winds down, so the producer can
//! always finish its last put and no event is lost or reordered.
//!
//! [`ChangeEvent`]: crate::types::ChangeEvent
//! [`ChangeStream`]: crate::stream::ChangeStream

pub mod concurrency;
pub mod error;
pub mod macros;
pub mod metrics;
pub mod position;
pub mod stream;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
