//! A scripted stand-in for the external CDC engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::concurrency::queue::EventTx;
use crate::concurrency::shutdown::StopHandle;
use crate::types::ChangeEvent;

/// Fake CDC engine publishing a scripted sequence of events into the
/// hand-off queue from a background task.
///
/// Mirrors the collaborator surface the real engine exposes: it publishes
/// into the queue it was constructed with, reports whether it has finished
/// producing, and can be stopped once through a [`StopHandle`].
pub struct ScriptedSource {
    stopped: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedSource {
    /// Starts publishing `events` in order, dropping the queue sender once
    /// the script ends.
    pub fn start(queue: EventTx<ChangeEvent>, events: Vec<ChangeEvent>) -> Self {
        Self::spawn(queue, events, false)
    }

    /// Starts publishing `events` in order, then keeps the queue open until
    /// the source is stopped.
    ///
    /// Use this when a test must observe idle polls instead of a closed
    /// queue after the script runs out.
    pub fn start_held_open(queue: EventTx<ChangeEvent>, events: Vec<ChangeEvent>) -> Self {
        Self::spawn(queue, events, true)
    }

    fn spawn(queue: EventTx<ChangeEvent>, events: Vec<ChangeEvent>, hold_open: bool) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn({
            let stopped = stopped.clone();
            let finished = finished.clone();
            async move {
                for event in events {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    if queue.send(event).await.is_err() {
                        break;
                    }
                }
                finished.store(true, Ordering::SeqCst);
                debug!("scripted source finished publishing");

                if hold_open {
                    while !stopped.load(Ordering::SeqCst) {
                        sleep(Duration::from_millis(5)).await;
                    }
                }
            }
        });

        Self {
            stopped,
            finished,
            stop_calls: Arc::new(AtomicUsize::new(0)),
            handle,
        }
    }

    /// Returns a probe reporting whether the source finished its script.
    pub fn finished_probe(&self) -> impl Fn() -> bool + Send + Sync + 'static + use<> {
        let finished = self.finished.clone();
        move || finished.load(Ordering::SeqCst)
    }

    /// Returns a probe reporting whether the source is still running.
    pub fn running_probe(&self) -> impl Fn() -> bool + Send + Sync + 'static + use<> {
        let finished = self.finished.clone();
        let stopped = self.stopped.clone();
        move || !finished.load(Ordering::SeqCst) && !stopped.load(Ordering::SeqCst)
    }

    /// Returns the one-shot stop handle for this source.
    pub fn stop_handle(&self) -> StopHandle {
        let stopped = self.stopped.clone();
        let stop_calls = self.stop_calls.clone();

        StopHandle::new(move || {
            stop_calls.fetch_add(1, Ordering::SeqCst);
            stopped.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    /// Number of times a stop handle of this source has fired.
    pub fn stop_invocations(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Waits for the publishing task to wind down.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}
