//! Target position tracking.
//!
//! A sync attempt captures the source's current log position once at start
//! and streams until replication catches up to it. The tracker is the
//! per-engine strategy that compares an event's embedded position against
//! that immutable target and parses positions out of heartbeat offsets.

use std::fmt;

use serde_json::Value;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::{ChangeEventWithMetadata, Lsn, OffsetMap};

/// Strategy deciding whether the replicated position has caught up to the
/// target captured at sync start.
///
/// Implementations must be pure and non-blocking and hold no shared mutable
/// state; one implementation exists per source engine. Extraction failures
/// indicate a mis-configured position scheme and are propagated, never
/// retried.
pub trait TargetPositionTracker: Send + Sync {
    /// Totally ordered progress marker used by this source engine.
    type Position: PartialOrd + fmt::Debug + Send;

    /// Returns true iff a non-heartbeat event's embedded position is at or
    /// beyond the target. Heartbeats never satisfy the target through this
    /// check; their positions go through [`Self::position_from_heartbeat`].
    fn reached_target_position(&self, event: &ChangeEventWithMetadata) -> CdcResult<bool>;

    /// Parses a heartbeat's offset map into the comparison position type.
    ///
    /// Heartbeats carry no row data but do carry current replication
    /// progress, which is what distinguishes "caught up, quiet" from
    /// "stalled".
    fn position_from_heartbeat(&self, offset: &OffsetMap) -> CdcResult<Self::Position>;

    /// Returns true iff an already extracted heartbeat position is at or
    /// beyond the target.
    fn position_reached_target(&self, position: &Self::Position) -> bool;
}

/// Offset key under which LSN-based sources report their position.
pub const LSN_OFFSET_KEY: &str = "lsn";

/// Target position tracking for sources that report an LSN offset.
#[derive(Debug, Clone, Copy)]
pub struct LsnPositionTracker {
    target: Lsn,
}

impl LsnPositionTracker {
    /// Creates a tracker for the target position captured at sync start.
    pub fn new(target: Lsn) -> Self {
        Self { target }
    }

    /// Returns the immutable target position.
    pub fn target(&self) -> Lsn {
        self.target
    }

    fn lsn_from_offset(offset: &OffsetMap) -> CdcResult<Lsn> {
        let Some(value) = offset.get(LSN_OFFSET_KEY) else {
            bail!(
                ErrorKind::PositionExtractionFailed,
                "Missing LSN in offset map",
                format!("expected key `{LSN_OFFSET_KEY}`")
            );
        };

        // Engines serialize the LSN either as a JSON number or as a string,
        // in decimal or in the split hex form.
        let lsn = match value {
            Value::Number(number) => number.as_u64().map(Lsn::new),
            Value::String(text) => text
                .parse::<u64>()
                .map(Lsn::new)
                .ok()
                .or_else(|| text.parse::<Lsn>().ok()),
            _ => None,
        };

        match lsn {
            Some(lsn) => Ok(lsn),
            None => bail!(
                ErrorKind::PositionExtractionFailed,
                "Unparseable LSN in offset map",
                value.to_string()
            ),
        }
    }
}

impl TargetPositionTracker for LsnPositionTracker {
    type Position = Lsn;

    fn reached_target_position(&self, event: &ChangeEventWithMetadata) -> CdcResult<bool> {
        if event.is_heartbeat() {
            return Ok(false);
        }

        let position = Self::lsn_from_offset(event.source_offset())?;

        Ok(position >= self.target)
    }

    fn position_from_heartbeat(&self, offset: &OffsetMap) -> CdcResult<Lsn> {
        Self::lsn_from_offset(offset)
    }

    fn position_reached_target(&self, position: &Lsn) -> bool {
        *position >= self.target
    }
}
