#![cfg(feature = "test-utils")]

use cdc::concurrency::queue::create_event_queue;
use cdc::concurrency::shutdown::ShutdownCoordinator;
use cdc::error::ErrorKind;
use cdc::position::LsnPositionTracker;
use cdc::stream::ChangeStream;
use cdc::test_utils::event::{data_event, heartbeat_event};
use cdc::test_utils::source::ScriptedSource;
use cdc::types::{ChangeEvent, ChangeEventWithMetadata, Lsn};
use config::shared::StreamConfig;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use telemetry::tracing::init_test_tracing;

fn small_config() -> StreamConfig {
    StreamConfig {
        queue_capacity: 10,
        idle_wait_ms: 50,
        max_idle_polls: 4,
        drain_poll_ms: 5,
    }
}

fn coordinator_for(source: &ScriptedSource) -> ShutdownCoordinator<ChangeEvent> {
    ShutdownCoordinator::with_poll_interval(
        source.stop_handle(),
        source.finished_probe(),
        Duration::from_millis(5),
    )
}

fn row_of(event: &ChangeEventWithMetadata) -> u64 {
    event.payload().unwrap()["row"].as_u64().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn streams_to_target_through_queue_and_residual_buffer() {
    init_test_tracing();

    // 200 data events through a queue of capacity 10: most of the tail is
    // still being produced when the boundary event at LSN 150 arrives, so
    // delivery has to cross the queue -> residual buffer transition.
    let events = (1..=200u64)
        .map(|lsn| data_event(lsn, json!({"row": lsn})))
        .collect();

    let (tx, rx) = create_event_queue(10);
    let source = ScriptedSource::start(tx, events);

    let config = small_config();
    let mut stream = ChangeStream::new(
        rx,
        LsnPositionTracker::new(Lsn::new(150)),
        || true,
        coordinator_for(&source),
        &config,
    );

    let mut seen = Vec::new();
    while let Some(event) = stream.next().await.unwrap() {
        seen.push(row_of(&event));
    }

    // Everything except the boundary event itself, in production order.
    let expected: Vec<u64> = (1..=200).filter(|row| *row != 150).collect();
    assert_eq!(seen, expected);
    assert_eq!(source.stop_invocations(), 1);

    source.wait().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn heartbeats_are_consumed_and_end_quiet_catch_up() {
    init_test_tracing();

    // Replication catches up during a quiet period: only heartbeats arrive,
    // climbing past the target. The stream must end without yielding
    // anything and stop the source exactly once.
    let events = vec![
        heartbeat_event(80),
        heartbeat_event(120),
        heartbeat_event(200),
    ];

    let (tx, rx) = create_event_queue(10);
    let source = ScriptedSource::start_held_open(tx, events);

    let config = small_config();
    let mut stream = ChangeStream::new(
        rx,
        LsnPositionTracker::new(Lsn::new(150)),
        || true,
        coordinator_for(&source),
        &config,
    );

    assert!(stream.next().await.unwrap().is_none());
    assert_eq!(source.stop_invocations(), 1);

    source.wait().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn interleaved_heartbeats_are_never_yielded() {
    init_test_tracing();

    let events = vec![
        data_event(1, json!({"row": 1})),
        heartbeat_event(1),
        data_event(2, json!({"row": 2})),
        heartbeat_event(2),
        data_event(10, json!({"row": 10})),
    ];

    let (tx, rx) = create_event_queue(10);
    let source = ScriptedSource::start(tx, events);

    let config = small_config();
    let mut stream = ChangeStream::new(
        rx,
        LsnPositionTracker::new(Lsn::new(10)),
        || true,
        coordinator_for(&source),
        &config,
    );

    let mut seen = Vec::new();
    while let Some(event) = stream.next().await.unwrap() {
        assert!(!event.is_heartbeat());
        seen.push(row_of(&event));
    }

    assert_eq!(seen, vec![1, 2]);

    source.wait().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_source_fails_instead_of_hanging() {
    init_test_tracing();

    let (tx, rx) = create_event_queue(10);
    let source = ScriptedSource::start_held_open(tx, Vec::new());

    let config = StreamConfig {
        queue_capacity: 10,
        idle_wait_ms: 20,
        max_idle_polls: 3,
        drain_poll_ms: 5,
    };
    let mut stream = ChangeStream::new(
        rx,
        LsnPositionTracker::new(Lsn::new(100)),
        || true,
        coordinator_for(&source),
        &config,
    );

    let err = stream.next().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StallTimeout);

    // The stall path never asked the source to stop.
    assert_eq!(source.stop_invocations(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn into_stream_adapter_yields_the_same_sequence() {
    init_test_tracing();

    let events = (1..=5u64)
        .map(|lsn| data_event(lsn, json!({"row": lsn})))
        .collect();

    let (tx, rx) = create_event_queue(10);
    let source = ScriptedSource::start(tx, events);

    let config = small_config();
    let stream = ChangeStream::new(
        rx,
        LsnPositionTracker::new(Lsn::new(4)),
        || true,
        coordinator_for(&source),
        &config,
    );

    let rows: Vec<u64> = stream
        .into_stream()
        .map(|event| row_of(&event.unwrap()))
        .collect()
        .await;

    assert_eq!(rows, vec![1, 2, 3, 5]);

    source.wait().await;
}
