//! Concurrency utilities for the hand-off between the CDC engine and the
//! consumer.
//!
//! Exactly two logical tasks touch the bounded queue: the producer owned by
//! the external engine and the consumer owning the stream/coordinator pair.
//! The modules here keep that hand-off deadlock free:
//!
//! - [`queue`] wraps the bounded channel that provides producer backpressure.
//! - [`relay`] implements the non-blocking drain loop that relieves a
//!   producer blocked on a full queue.
//! - [`shutdown`] runs the drain-then-stop procedure that terminates the
//!   producer without losing buffered events.

pub mod queue;
pub mod relay;
pub mod shutdown;
