//! Non-blocking queue draining.
//!
//! The producer may be blocked on a put into a full queue at the exact
//! moment the consumer stops reading directly. A blocking take here would
//! deadlock against that put, so every drain in this crate is a
//! poll-and-check loop: pop whatever is currently queued, re-check the
//! governing predicate, sleep briefly, repeat.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::sleep;
use tracing::debug;

use crate::bail;
use crate::concurrency::queue::EventRx;
use crate::error::{CdcResult, ErrorKind};

/// Default interval between drain passes.
///
/// Long enough to avoid busy-spinning against a slow-to-react producer,
/// short enough that a producer blocked on a full queue is relieved quickly.
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Moves everything currently sitting in `queue` into `sink` without
/// blocking, preserving order. Returns the number of items moved.
pub(crate) fn drain_available<T>(queue: &mut EventRx<T>, mut sink: impl FnMut(T)) -> usize {
    let mut drained = 0;

    loop {
        match queue.try_recv() {
            Ok(item) => {
                sink(item);
                drained += 1;
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }

    drained
}

/// Relays events from the bounded source queue into an independently
/// buffered queue while more events are expected.
///
/// This is the drain pattern without any position awareness: it decouples a
/// fast producer from a differently paced downstream stage. The sink is
/// unbounded, so the relay itself never exerts backpressure; the bounded
/// source queue remains the memory bound on the producer side.
pub struct QueueRelay<T> {
    source: EventRx<T>,
    sink: mpsc::UnboundedSender<T>,
    poll_interval: Duration,
}

impl<T> QueueRelay<T> {
    /// Creates a relay with the default poll interval.
    pub fn new(source: EventRx<T>, sink: mpsc::UnboundedSender<T>) -> Self {
        Self::with_poll_interval(source, sink, DEFAULT_POLL_INTERVAL)
    }

    /// Creates a relay polling the source at the supplied interval.
    pub fn with_poll_interval(
        source: EventRx<T>,
        sink: mpsc::UnboundedSender<T>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            poll_interval,
        }
    }

    /// Runs the relay until `more_expected` stops holding, then performs a
    /// final drain so that items enqueued around the predicate flip are not
    /// left behind. Returns the total number of items relayed.
    pub async fn run(mut self, mut more_expected: impl FnMut() -> bool) -> CdcResult<usize> {
        let mut relayed = 0;

        while more_expected() {
            relayed += self.relay_available()?;
            sleep(self.poll_interval).await;
        }

        relayed += self.relay_available()?;
        debug!(relayed, "queue relay finished");

        Ok(relayed)
    }

    fn relay_available(&mut self) -> CdcResult<usize> {
        let QueueRelay { source, sink, .. } = self;

        let mut closed = false;
        let moved = drain_available(source, |item| {
            if sink.send(item).is_err() {
                closed = true;
            }
        });

        if closed {
            bail!(
                ErrorKind::InterruptedWait,
                "Relay sink closed while events were still expected"
            );
        }

        Ok(moved)
    }
}
