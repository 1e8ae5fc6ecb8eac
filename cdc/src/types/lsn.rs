use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log sequence number: an opaque, totally ordered marker of progress
/// through the source change log.
///
/// Rendered and parsed in the split `hi/lo` hexadecimal form used by
/// Postgres, e.g. `16/B374D848`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Lsn(u64);

impl Lsn {
    /// Creates an [`Lsn`] from its numeric form.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric form of this [`Lsn`].
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Lsn> for u64 {
    fn from(value: Lsn) -> Self {
        value.0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 as u32)
    }
}

/// Error returned when parsing an [`Lsn`] from its textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLsnError;

impl fmt::Display for ParseLsnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected a log sequence number in the form `hi/lo`")
    }
}

impl std::error::Error for ParseLsnError {}

impl FromStr for Lsn {
    type Err = ParseLsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s.split_once('/').ok_or(ParseLsnError)?;
        let hi = u64::from_str_radix(hi, 16).map_err(|_| ParseLsnError)?;
        let lo = u64::from_str_radix(lo, 16).map_err(|_| ParseLsnError)?;

        if hi > u32::MAX as u64 || lo > u32::MAX as u64 {
            return Err(ParseLsnError);
        }

        Ok(Lsn((hi << 32) | lo))
    }
}
