//! Closed integer intervals.

use crate::error::ParseIntervalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A closed range `[lo, hi]` of integer keys.
///
/// Always satisfies `lo <= hi`. The canonical text form is `"lo-hi"`, which
/// is also how intervals are persisted and serialized.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    lo: i64,
    hi: i64,
}

impl Interval {
    /// Create an interval, rejecting `lo > hi`.
    pub fn new(lo: i64, hi: i64) -> Result<Self, ParseIntervalError> {
        if lo > hi {
            return Err(ParseIntervalError::Reversed { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    /// A one-element interval `[point, point]`.
    pub fn point(point: i64) -> Self {
        Self {
            lo: point,
            hi: point,
        }
    }

    /// Lower bound (inclusive).
    pub fn lo(&self) -> i64 {
        self.lo
    }

    /// Upper bound (inclusive).
    pub fn hi(&self) -> i64 {
        self.hi
    }

    /// Check if `point` lies inside this interval.
    pub fn contains(&self, point: i64) -> bool {
        self.lo <= point && point <= self.hi
    }

    /// Check if the two intervals overlap or sit next to each other with no
    /// integer between them.
    pub fn touches(&self, other: &Interval) -> bool {
        self.hi >= other.lo.saturating_sub(1) && self.lo <= other.hi.saturating_add(1)
    }

    /// The smallest interval covering both.
    pub fn span(&self, other: &Interval) -> Interval {
        Interval {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interval[{}, {}]", self.lo, self.hi)
    }
}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseIntervalError::Malformed(s.to_string());

        // Skip a leading minus so "-5--3" splits as "-5" / "-3".
        let split = s
            .get(1..)
            .and_then(|rest| rest.find('-'))
            .map(|idx| idx + 1)
            .ok_or_else(malformed)?;
        let (lo, hi) = (&s[..split], &s[split + 1..]);

        let lo = lo.parse::<i64>().map_err(|_| malformed())?;
        let hi = hi.parse::<i64>().map_err(|_| malformed())?;
        Interval::new(lo, hi)
    }
}

impl TryFrom<String> for Interval {
    type Error = ParseIntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> String {
        value.to_string()
    }
}
