//! # ager-service
//!
//! Persistent ready-watermark tracking for Ager.
//!
//! This crate drives the pure logic of `ager-core` against a store:
//! - Initializes partitions and records arriving key ranges
//! - Resolves real-time partitions on every record
//! - Runs the scheduler that reports batched partitions frame by frame
//! - Persists ledgers in SQLite (or memory, for tests and ephemeral runs)
//!
//! ## Architecture
//!
//! ```text
//! record_range ──┐                 ┌── run_scheduler
//!                │                 │
//!            ┌───┴─────────────────┴───┐
//!            │           Ager          │
//!            │  resolve / compact via  │
//!            │        ager-core        │
//!            │  ┌───────────────────┐  │
//!            │  │    LedgerStore    │  │
//!            │  │ (SQLite | memory) │  │
//!            │  └───────────────────┘  │
//!            └─────────────────────────┘
//! ```
//!
//! ## Records
//!
//! Each partition has a ledger (anchor, frame length, intervals per frame,
//! scheduled frames). A single controller record tracks scheduler progress.
//! All writes go through atomic `LedgerUpdate`s.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{AgerError, Result, StorageError};
pub use metrics::AgerMetrics;
pub use scheduler::ScanMode;
pub use storage::{open_store, LedgerStore, MemoryStore, SqliteStore};
pub use task::spawn_scheduler_task;
pub use tracker::Ager;
