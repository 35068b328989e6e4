//! Error types for ager-service.

use ager_core::LedgerError;
use ager_types::ParseFrameError;
use std::path::PathBuf;

/// Main error type for Ager operations.
#[derive(Debug, thiserror::Error)]
pub enum AgerError {
    /// Frame length incompatible with the configured minimum.
    #[error(
        "invalid frame length {frame_length}: must be a multiple of {min_frame_length} seconds"
    )]
    InvalidConfig {
        /// Frame length requested at init.
        frame_length: u32,
        /// Configured minimum frame length.
        min_frame_length: u32,
    },

    /// Range with start above end.
    #[error("invalid range: start {start} exceeds end {end}")]
    InvalidRange {
        /// Start key given.
        start: i64,
        /// End key given.
        end: i64,
    },

    /// No ledger entry exists for the partition.
    #[error("partition not initialized: {key}")]
    Uninitialized {
        /// Partition key.
        key: String,
    },

    /// A stored ledger cannot be interpreted.
    #[error(transparent)]
    CorruptLedger(#[from] LedgerError),

    /// The clock reads a time no frame id can represent.
    #[error("clock out of range: {0}")]
    Clock(#[from] ParseFrameError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<StorageError> for AgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt(inner) => AgerError::CorruptLedger(inner),
            other => AgerError::Storage(other),
        }
    }
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value failed to parse.
    #[error("{0}")]
    Corrupt(#[from] LedgerError),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Result type alias for Ager operations.
pub type Result<T> = std::result::Result<T, AgerError>;
