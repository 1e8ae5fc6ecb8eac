use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Offset map identifying an event's position in the source change log.
///
/// The keys and value shapes are owned by the source engine; this layer only
/// hands the map to the position tracker configured for that engine.
pub type OffsetMap = serde_json::Map<String, Value>;

/// Opaque change record published by the CDC engine.
///
/// A record with no payload is a heartbeat: a synthetic event emitted during
/// quiet periods solely to report current replication progress. Heartbeats
/// are what let the consumer distinguish "caught up and quiet" from
/// "stalled".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Serialized row change, absent for heartbeats.
    pub payload: Option<Value>,
    /// Source offset map identifying this event's log position.
    pub source_offset: OffsetMap,
}

impl ChangeEvent {
    /// Creates a new [`ChangeEvent`].
    pub fn new(payload: Option<Value>, source_offset: OffsetMap) -> Self {
        Self {
            payload,
            source_offset,
        }
    }

    /// Returns true when this event carries no row data.
    pub fn is_heartbeat(&self) -> bool {
        self.payload.is_none()
    }
}

/// Immutable wrapper created once per dequeued [`ChangeEvent`], carrying
/// pre-extracted metadata so downstream checks don't re-inspect the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEventWithMetadata {
    event: ChangeEvent,
    is_heartbeat: bool,
}

impl ChangeEventWithMetadata {
    /// Wraps a dequeued event, computing its metadata once.
    pub fn new(event: ChangeEvent) -> Self {
        let is_heartbeat = event.is_heartbeat();

        Self {
            event,
            is_heartbeat,
        }
    }

    /// Returns true when the wrapped event is a heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.is_heartbeat
    }

    /// Returns the row payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.event.payload.as_ref()
    }

    /// Returns the source offset map of the wrapped event.
    pub fn source_offset(&self) -> &OffsetMap {
        &self.event.source_offset
    }

    /// Unwraps the underlying event.
    pub fn into_event(self) -> ChangeEvent {
        self.event
    }
}
