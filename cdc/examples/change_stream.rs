//! Streams a simulated change feed to its target position and prints every
//! delivered event.
//!
//! The producer task stands in for the external CDC engine: it publishes a
//! burst of data events and periodic heartbeats into the bounded hand-off
//! queue, far outpacing the queue capacity, and reports when it has finished
//! producing. The consumer reaches its target in the middle of the burst,
//! so the tail of the feed is delivered through the shutdown drain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cdc::concurrency::queue::{EventTx, create_event_queue};
use cdc::concurrency::shutdown::{ShutdownCoordinator, StopHandle};
use cdc::position::{LSN_OFFSET_KEY, LsnPositionTracker};
use cdc::stream::ChangeStream;
use cdc::types::{ChangeEvent, Lsn, OffsetMap};
use config::shared::StreamConfig;
use serde_json::json;
use tracing::info;

const FEED_END: u64 = 300;

fn event_at(lsn: u64, payload: Option<serde_json::Value>) -> ChangeEvent {
    let mut offset = OffsetMap::new();
    offset.insert(LSN_OFFSET_KEY.to_string(), json!(lsn));

    ChangeEvent::new(payload, offset)
}

async fn run_engine(queue: EventTx<ChangeEvent>, stopped: Arc<AtomicBool>) {
    let mut lsn = 0u64;

    while lsn < FEED_END && !stopped.load(Ordering::SeqCst) {
        lsn += 1;

        let event = if lsn % 10 == 0 {
            event_at(lsn, None)
        } else {
            event_at(lsn, Some(json!({ "table": "users", "id": lsn })))
        };

        if queue.send(event).await.is_err() {
            break;
        }
    }

    info!(last_lsn = lsn, "engine finished producing");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::tracing::init_tracing();

    let config = StreamConfig {
        queue_capacity: 16,
        idle_wait_ms: 500,
        max_idle_polls: 4,
        drain_poll_ms: 20,
    };
    config.validate()?;

    let (tx, rx) = create_event_queue(config.queue_capacity);

    let stopped = Arc::new(AtomicBool::new(false));
    let engine = tokio::spawn(run_engine(tx, stopped.clone()));

    let stop_handle = StopHandle::new({
        let stopped = stopped.clone();
        move || {
            stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    });
    let coordinator = ShutdownCoordinator::with_poll_interval(
        stop_handle,
        {
            let engine = engine.abort_handle();
            move || engine.is_finished()
        },
        config.drain_poll_interval(),
    );

    // Pretend the sync started when the source log stood at LSN 120.
    let tracker = LsnPositionTracker::new(Lsn::new(120));
    let mut stream = ChangeStream::new(rx, tracker, || true, coordinator, &config);

    let mut delivered = 0u64;
    while let Some(event) = stream.next().await? {
        delivered += 1;
        info!(payload = %event.payload().expect("data event"), "delivered");
    }

    info!(delivered, "change stream finished");
    engine.await?;

    Ok(())
}
