//! The consumer-facing change stream.
//!
//! [`ChangeStream`] is a lazy, finite, non-restartable pull sequence over
//! the events an external CDC engine publishes into the bounded hand-off
//! queue. It combines the queue, a [`TargetPositionTracker`] and a
//! [`ShutdownCoordinator`] into stall detection plus a transparent
//! shutdown-and-drain once the target position is reached or the caller
//! cancels.
//!
//! Heartbeats are consumed here and never yielded: they reset the idle
//! budget and let the stream tell "quiet because caught up" from "quiet
//! because dead".

use std::time::Duration;

use config::shared::StreamConfig;
use futures::Stream;
use metrics::counter;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::bail;
use crate::concurrency::queue::EventRx;
use crate::concurrency::shutdown::ShutdownCoordinator;
use crate::error::{CdcResult, ErrorKind};
use crate::metrics::{CDC_EVENTS_YIELDED_TOTAL, CDC_HEARTBEATS_TOTAL, CDC_IDLE_POLLS_TOTAL};
use crate::position::TargetPositionTracker;
use crate::types::{ChangeEvent, ChangeEventWithMetadata};

/// Consumer pull state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// Reading the hand-off queue directly.
    Polling,
    /// Target reached or sync cancelled: serving the residual buffer.
    Draining,
    /// Terminal; no further item is ever reported.
    Exhausted,
}

/// Lazy, finite, non-restartable sequence of change events.
///
/// The stream ends only after the producer is fully stopped and every
/// residual event has been delivered, so ending the iteration is always safe
/// for at-least-once delivery. Cancellation through the keep-waiting
/// predicate takes the identical drain-then-stop path as normal completion
/// and therefore never loses buffered events.
pub struct ChangeStream<T>
where
    T: TargetPositionTracker,
{
    queue: EventRx<ChangeEvent>,
    tracker: T,
    keep_waiting: Box<dyn FnMut() -> bool + Send>,
    coordinator: ShutdownCoordinator<ChangeEvent>,
    idle_wait: Duration,
    max_idle_polls: u32,
    idle_polls: u32,
    state: StreamState,
}

impl<T> ChangeStream<T>
where
    T: TargetPositionTracker,
{
    /// Creates a change stream over the hand-off queue of one sync attempt.
    ///
    /// `keep_waiting` is the caller's cancellation signal: it is consulted on
    /// every idle poll and heartbeat and must be cheap and non-blocking.
    pub fn new(
        queue: EventRx<ChangeEvent>,
        tracker: T,
        keep_waiting: impl FnMut() -> bool + Send + 'static,
        coordinator: ShutdownCoordinator<ChangeEvent>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            queue,
            tracker,
            keep_waiting: Box::new(keep_waiting),
            coordinator,
            idle_wait: config.idle_wait(),
            max_idle_polls: config.max_idle_polls,
            idle_polls: 0,
            state: StreamState::Polling,
        }
    }

    /// Pulls the next change event.
    ///
    /// Returns `Ok(None)` once the producer is fully stopped and all
    /// residual events have been delivered; every later call returns
    /// `Ok(None)` as well, regardless of activity on the underlying queue.
    pub async fn next(&mut self) -> CdcResult<Option<ChangeEventWithMetadata>> {
        loop {
            match self.state {
                StreamState::Exhausted => return Ok(None),
                StreamState::Draining => match self.next_remaining() {
                    Some(event) => return Ok(Some(event)),
                    None => {
                        self.state = StreamState::Exhausted;
                        debug!("change stream exhausted");

                        return Ok(None);
                    }
                },
                StreamState::Polling => {
                    if let Some(event) = self.poll_queue().await? {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    /// Converts the pull interface into a [`Stream`] of change events.
    pub fn into_stream(self) -> impl Stream<Item = CdcResult<ChangeEventWithMetadata>> + Send
    where
        T: 'static,
    {
        futures::stream::try_unfold(self, |mut stream| async move {
            let item = stream.next().await?;

            Ok(item.map(|event| (event, stream)))
        })
    }

    /// One timed take against the queue.
    ///
    /// Returns `Ok(Some)` when an event should be yielded and `Ok(None)`
    /// when the state machine should take another turn.
    async fn poll_queue(&mut self) -> CdcResult<Option<ChangeEventWithMetadata>> {
        match timeout(self.idle_wait, self.queue.recv()).await {
            Ok(Some(event)) => {
                self.idle_polls = 0;
                let event = ChangeEventWithMetadata::new(event);

                if event.is_heartbeat() {
                    self.observe_heartbeat(&event).await?;

                    return Ok(None);
                }

                if self.tracker.reached_target_position(&event)? {
                    // The event satisfying the target is the stopping signal,
                    // not payload: it is dropped, and everything already
                    // buffered is served through the residual buffer instead.
                    info!("target position reached, shutting down source");
                    self.begin_drain().await?;

                    return Ok(None);
                }

                counter!(CDC_EVENTS_YIELDED_TOTAL).increment(1);

                Ok(Some(event))
            }
            Ok(None) => {
                bail!(
                    ErrorKind::InterruptedWait,
                    "Hand-off queue closed while the consumer was waiting for events"
                )
            }
            Err(_) => {
                counter!(CDC_IDLE_POLLS_TOTAL).increment(1);

                if !(self.keep_waiting)() {
                    info!("sync cancelled during quiet period, shutting down source");
                    self.begin_drain().await?;

                    return Ok(None);
                }

                self.idle_polls += 1;
                if self.idle_polls >= self.max_idle_polls {
                    bail!(
                        ErrorKind::StallTimeout,
                        "No change event received from the source",
                        format!(
                            "waited {} consecutive polls of {:?}",
                            self.idle_polls, self.idle_wait
                        )
                    );
                }

                Ok(None)
            }
        }
    }

    /// Handles a heartbeat: never yielded, but its embedded position can end
    /// the sync when replication has caught up while the log is quiet.
    async fn observe_heartbeat(&mut self, event: &ChangeEventWithMetadata) -> CdcResult<()> {
        counter!(CDC_HEARTBEATS_TOTAL).increment(1);

        let position = self.tracker.position_from_heartbeat(event.source_offset())?;
        if self.tracker.position_reached_target(&position) {
            info!(
                position = ?position,
                "heartbeat position reached target, shutting down source"
            );
            self.begin_drain().await?;
        } else if !(self.keep_waiting)() {
            info!("sync cancelled while catching up, shutting down source");
            self.begin_drain().await?;
        }

        Ok(())
    }

    /// Runs the shutdown procedure and switches to serving the residual
    /// buffer.
    ///
    /// The state flips before the procedure runs so that buffered events
    /// remain reachable even when the stop callback fails.
    async fn begin_drain(&mut self) -> CdcResult<()> {
        self.state = StreamState::Draining;

        self.coordinator.initiate_shutdown(&mut self.queue).await
    }

    fn next_remaining(&mut self) -> Option<ChangeEventWithMetadata> {
        while let Some(event) = self.coordinator.pop_remaining() {
            let event = ChangeEventWithMetadata::new(event);

            // Residual heartbeats carry no data and are dropped like live
            // ones.
            if event.is_heartbeat() {
                counter!(CDC_HEARTBEATS_TOTAL).increment(1);
                continue;
            }

            counter!(CDC_EVENTS_YIELDED_TOTAL).increment(1);

            return Some(event);
        }

        None
    }
}
