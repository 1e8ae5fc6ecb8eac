//! The bounded hand-off queue between the CDC engine and the consumer.
//!
//! This module abstracts tokio's bounded mpsc channel into the queue types
//! used for producer/consumer decoupling. The producer awaits on `send` when
//! the queue is full, which is the backpressure mechanism bounding memory
//! usage; the consumer takes with a timeout while streaming and switches to
//! non-blocking polls while draining.

use tokio::sync::mpsc;

/// Producer side of the bounded hand-off queue.
pub type EventTx<T> = mpsc::Sender<T>;

/// Consumer side of the bounded hand-off queue.
pub type EventRx<T> = mpsc::Receiver<T>;

/// Creates the bounded hand-off queue for one sync attempt.
///
/// The queue is single producer, single consumer, and strictly FIFO. It is
/// created before the CDC engine starts publishing and discarded when the
/// sync attempt ends; it is never reused across attempts.
pub fn create_event_queue<T>(capacity: usize) -> (EventTx<T>, EventRx<T>) {
    mpsc::channel(capacity)
}
