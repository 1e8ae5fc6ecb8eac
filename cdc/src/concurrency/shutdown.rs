//! Graceful shutdown of the source engine without event loss.
//!
//! Stopping is a three phase procedure. While waiting for the completion
//! predicate, the coordinator keeps relay-draining the bounded queue into an
//! unbounded residual buffer, because the producer may be blocked on a put
//! into a full queue and must be able to finish it. Once the predicate
//! holds, the engine's stop callback fires exactly once, and a final drain
//! catches whatever arrived while the stop was taking effect. The residual
//! buffer preserves production order and is the only thing left to read
//! afterwards.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use metrics::counter;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::concurrency::queue::EventRx;
use crate::concurrency::relay::{DEFAULT_POLL_INTERVAL, drain_available};
use crate::error::CdcResult;
use crate::metrics::{CDC_RESIDUAL_EVENTS_TOTAL, CDC_SHUTDOWNS_TOTAL};

/// One-shot wrapper around the source engine's stop operation.
///
/// The engine exposes a single fire-and-continue stop callback that may take
/// unbounded time to actually quiesce. [`StopHandle`] guarantees this layer
/// invokes it at most once; repeated-stop semantics are engine specific and
/// unsafe to assume.
pub struct StopHandle {
    stop: Option<Box<dyn FnOnce() -> CdcResult<()> + Send>>,
}

impl StopHandle {
    /// Wraps a stop callback.
    pub fn new(stop: impl FnOnce() -> CdcResult<()> + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// Invokes the stop callback if it has not fired yet.
    pub fn invoke(&mut self) -> CdcResult<()> {
        match self.stop.take() {
            Some(stop) => stop(),
            None => Ok(()),
        }
    }

    /// Returns true once the callback has fired.
    pub fn is_spent(&self) -> bool {
        self.stop.is_none()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Lifecycle of the shutdown procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Normal operation: the consumer reads the queue directly.
    Running,
    /// The window between "stop decided" and "producer actually stopped",
    /// during which the queue is relay-drained into the residual buffer.
    Draining,
    /// Terminal state; only residual buffer reads remain.
    Stopped,
}

/// Drains the hand-off queue while the source engine winds down, then stops
/// it, preserving every produced event in order.
pub struct ShutdownCoordinator<T> {
    stop: StopHandle,
    complete: Box<dyn FnMut() -> bool + Send>,
    residual: VecDeque<T>,
    poll_interval: Duration,
    state: ShutdownState,
}

impl<T> ShutdownCoordinator<T> {
    /// Creates a coordinator with the default drain poll interval.
    ///
    /// `complete` reports when the engine is ready to be stopped; it is
    /// re-checked on every drain pass and must be cheap and non-blocking.
    pub fn new(stop: StopHandle, complete: impl FnMut() -> bool + Send + 'static) -> Self {
        Self::with_poll_interval(stop, complete, DEFAULT_POLL_INTERVAL)
    }

    /// Creates a coordinator draining at the supplied poll interval.
    pub fn with_poll_interval(
        stop: StopHandle,
        complete: impl FnMut() -> bool + Send + 'static,
        poll_interval: Duration,
    ) -> Self {
        Self {
            stop,
            complete: Box::new(complete),
            residual: VecDeque::new(),
            poll_interval,
            state: ShutdownState::Running,
        }
    }

    /// Returns the current state of the shutdown procedure.
    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Runs the shutdown procedure to completion.
    ///
    /// Calling this again after it completed is a no-op: the stop callback
    /// does not fire a second time and the residual buffer is not touched.
    /// If the completion predicate already holds on entry, the drain loop
    /// runs zero iterations but the stop and the final drain still execute.
    ///
    /// A stop callback failure is propagated after the final drain, so the
    /// residual buffer stays complete even on the error path.
    pub async fn initiate_shutdown(&mut self, queue: &mut EventRx<T>) -> CdcResult<()> {
        if self.state == ShutdownState::Stopped {
            return Ok(());
        }

        self.state = ShutdownState::Draining;
        info!("shutting down change event source");

        // Draining must be continuous through the wait: queue capacity is far
        // smaller than what the producer may still emit, and the producer may
        // be blocked on a put this very moment.
        while !(self.complete)() {
            self.drain_into_residual(queue);
            sleep(self.poll_interval).await;
        }

        let stop_result = self.stop.invoke();
        if stop_result.is_err() {
            warn!("source stop callback failed, draining remaining events before surfacing");
        }

        // Catch whatever arrived between the predicate flipping and the stop
        // callback taking effect.
        let drained = self.drain_into_residual(queue);
        debug!(
            drained,
            remaining = self.residual.len(),
            "final drain complete"
        );

        self.state = ShutdownState::Stopped;
        counter!(CDC_SHUTDOWNS_TOTAL).increment(1);

        stop_result
    }

    /// Pops the next event left over after shutdown, in production order.
    ///
    /// Valid only once [`Self::initiate_shutdown`] has returned.
    pub fn pop_remaining(&mut self) -> Option<T> {
        debug_assert_eq!(
            self.state,
            ShutdownState::Stopped,
            "residual buffer read before shutdown completed"
        );

        self.residual.pop_front()
    }

    /// Number of events left over after shutdown.
    pub fn remaining_len(&self) -> usize {
        self.residual.len()
    }

    fn drain_into_residual(&mut self, queue: &mut EventRx<T>) -> usize {
        let residual = &mut self.residual;
        let drained = drain_available(queue, |event| residual.push_back(event));

        if drained > 0 {
            counter!(CDC_RESIDUAL_EVENTS_TOTAL).increment(drained as u64);
        }

        drained
    }
}

impl<T> fmt::Debug for ShutdownCoordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("state", &self.state)
            .field("remaining", &self.residual.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bail;
    use crate::concurrency::queue::create_event_queue;
    use crate::error::ErrorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_stop(calls: &Arc<AtomicUsize>) -> StopHandle {
        let calls = calls.clone();
        StopHandle::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_relieves_blocked_producer_without_loss() {
        let (tx, mut rx) = create_event_queue(10);

        // The producer outpaces the queue by an order of magnitude while the
        // consumer is not reading; only the coordinator's drain loop lets it
        // finish.
        let latest = Arc::new(AtomicU64::new(0));
        let producer = tokio::spawn({
            let latest = latest.clone();
            async move {
                for value in 0..100u64 {
                    tx.send(value).await.unwrap();
                    latest.store(value, Ordering::SeqCst);
                }
            }
        });

        let stop_calls = Arc::new(AtomicUsize::new(0));
        let mut coordinator = ShutdownCoordinator::with_poll_interval(
            counting_stop(&stop_calls),
            {
                let latest = latest.clone();
                move || latest.load(Ordering::SeqCst) >= 99
            },
            Duration::from_millis(5),
        );

        coordinator.initiate_shutdown(&mut rx).await.unwrap();
        producer.await.unwrap();

        assert_eq!(latest.load(Ordering::SeqCst), 99);
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().ok(), None);
        assert_eq!(coordinator.remaining_len(), 100);
        for expected in 0..100u64 {
            assert_eq!(coordinator.pop_remaining(), Some(expected));
        }
        assert_eq!(coordinator.pop_remaining(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_shutdown_is_a_no_op() {
        let (tx, mut rx) = create_event_queue(4);
        tx.send(1u64).await.unwrap();
        tx.send(2u64).await.unwrap();

        let stop_calls = Arc::new(AtomicUsize::new(0));
        let mut coordinator = ShutdownCoordinator::with_poll_interval(
            counting_stop(&stop_calls),
            || true,
            Duration::from_millis(5),
        );

        coordinator.initiate_shutdown(&mut rx).await.unwrap();
        assert_eq!(coordinator.remaining_len(), 2);

        coordinator.initiate_shutdown(&mut rx).await.unwrap();
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.remaining_len(), 2);
        assert_eq!(coordinator.pop_remaining(), Some(1));
        assert_eq!(coordinator.pop_remaining(), Some(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn early_completion_still_stops_and_drains() {
        let (tx, mut rx) = create_event_queue(4);
        tx.send(7u64).await.unwrap();

        let stop_calls = Arc::new(AtomicUsize::new(0));
        let mut coordinator = ShutdownCoordinator::with_poll_interval(
            counting_stop(&stop_calls),
            || true,
            Duration::from_millis(5),
        );

        coordinator.initiate_shutdown(&mut rx).await.unwrap();

        assert_eq!(coordinator.state(), ShutdownState::Stopped);
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pop_remaining(), Some(7));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_failure_is_surfaced_after_draining() {
        let (tx, mut rx) = create_event_queue(4);
        tx.send(1u64).await.unwrap();

        let mut coordinator = ShutdownCoordinator::with_poll_interval(
            StopHandle::new(|| bail!(ErrorKind::ProducerStopFailed, "Engine refused to stop")),
            || true,
            Duration::from_millis(5),
        );

        let err = coordinator.initiate_shutdown(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProducerStopFailed);

        // The residue survives the failure and the procedure is terminal.
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
        assert_eq!(coordinator.pop_remaining(), Some(1));
        coordinator.initiate_shutdown(&mut rx).await.unwrap();
    }

    #[test]
    fn stop_handle_fires_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handle = counting_stop(&calls);

        assert!(!handle.is_spent());
        handle.invoke().unwrap();
        handle.invoke().unwrap();

        assert!(handle.is_spent());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
