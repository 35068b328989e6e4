//! Error types for Ager value types.

use thiserror::Error;

/// An interval could not be built or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIntervalError {
    /// Text was not of the form `"lo-hi"`.
    #[error("malformed interval: {0:?}")]
    Malformed(String),

    /// Lower bound above upper bound.
    #[error("interval lower bound {lo} exceeds upper bound {hi}")]
    Reversed {
        /// Lower bound given.
        lo: i64,
        /// Upper bound given.
        hi: i64,
    },
}

/// A frame id could not be built or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFrameError {
    /// Text was not a `YYYYMMDDHHMMSS` timestamp.
    #[error("malformed frame id: {0:?}")]
    Malformed(String),

    /// Timestamp outside the representable frame id range.
    #[error("timestamp {0} out of frame id range")]
    OutOfRange(i64),
}
