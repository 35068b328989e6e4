//! # ager-types
//!
//! Value types shared by every Ager crate:
//! - [`Interval`] - closed `[lo, hi]` integer range, text form `"lo-hi"`
//! - [`FrameId`] - time bucket id, text form `YYYYMMDDHHMMSS`
//! - [`ParseIntervalError`], [`ParseFrameError`] - error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod interval;

pub use error::{ParseFrameError, ParseIntervalError};
pub use frame::FrameId;
pub use interval::Interval;
