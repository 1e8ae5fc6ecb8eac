//! Builders for change events positioned at a given LSN.

use serde_json::{Value, json};

use crate::position::LSN_OFFSET_KEY;
use crate::types::{ChangeEvent, OffsetMap};

/// Builds an offset map reporting `lsn` under the LSN offset key.
pub fn offset_with_lsn(lsn: u64) -> OffsetMap {
    let mut offset = OffsetMap::new();
    offset.insert(LSN_OFFSET_KEY.to_string(), json!(lsn));

    offset
}

/// Builds a data event positioned at `lsn`.
pub fn data_event(lsn: u64, payload: Value) -> ChangeEvent {
    ChangeEvent::new(Some(payload), offset_with_lsn(lsn))
}

/// Builds a heartbeat positioned at `lsn`.
pub fn heartbeat_event(lsn: u64) -> ChangeEvent {
    ChangeEvent::new(None, offset_with_lsn(lsn))
}
