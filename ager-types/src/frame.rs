//! Frame identifiers.

use crate::error::ParseFrameError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FORMAT: &str = "%Y%m%d%H%M%S";
const WIDTH: usize = 14;

/// Identifier of a time bucket, formatted as `YYYYMMDDHHMMSS` in UTC.
///
/// The format is fixed-width, so string order equals chronological order.
/// That property is what lets ledgers keep frames in a `BTreeMap` and lets
/// the scheduler ask for "every frame up to X".
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameId(String);

impl FrameId {
    /// Frame id for an exact timestamp (seconds since epoch).
    ///
    /// No rounding happens here; see `ager_core::frame::bucket`.
    pub fn from_timestamp(secs: i64) -> Result<Self, ParseFrameError> {
        let time = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or(ParseFrameError::OutOfRange(secs))?;
        let formatted = time.format(FORMAT).to_string();
        // Years past 9999 would widen the string and break ordering.
        if formatted.len() != WIDTH {
            return Err(ParseFrameError::OutOfRange(secs));
        }
        Ok(Self(formatted))
    }

    /// Seconds since epoch at the start of this frame.
    pub fn timestamp(&self) -> i64 {
        // Validated on construction.
        NaiveDateTime::parse_from_str(&self.0, FORMAT)
            .map(|naive| naive.and_utc().timestamp())
            .unwrap_or_default()
    }

    /// The formatted id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

impl FromStr for FrameId {
    type Err = ParseFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseFrameError::Malformed(s.to_string()));
        }
        NaiveDateTime::parse_from_str(s, FORMAT)
            .map_err(|_| ParseFrameError::Malformed(s.to_string()))?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for FrameId {
    type Error = ParseFrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameId> for String {
    fn from(value: FrameId) -> String {
        value.0
    }
}
