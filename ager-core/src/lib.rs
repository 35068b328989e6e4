//! # ager-core
//!
//! Pure logic for Ager (no I/O, instant tests).
//!
//! This crate implements the algorithms behind ready-watermark tracking
//! without touching a store or a clock, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take a ledger snapshot and
//! produce a result or a [`LedgerUpdate`] describing what to persist:
//! - [`merge`] - minimal covering sets of closed integer intervals
//! - [`frame`] - mapping wall-clock seconds to frame ids
//! - [`ledger`] - partition and controller records, atomic updates
//! - [`resolver`] - watermark computation and compaction planning
//!
//! Reading and writing ledgers is done by `ager-service`, which applies the
//! updates produced here against its store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod ledger;
pub mod merge;
pub mod resolver;

pub use ledger::{ControllerLedger, LedgerError, LedgerUpdate, PartitionLedger};
pub use merge::IntervalSet;
pub use resolver::{resolve, Compaction, Resolution};
