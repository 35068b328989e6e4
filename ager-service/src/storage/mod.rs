//! Storage layer for Ager.
//!
//! Persists partition ledgers and the controller record. Every mutating call
//! is atomic per record; nothing here holds a lock across calls.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{Backend, StorageConfig};
use crate::error::StorageError;
use ager_core::{ControllerLedger, LedgerUpdate, PartitionLedger};
use ager_types::FrameId;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for ledger storage backends.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Write a partition ledger, replacing any existing one under its key.
    async fn create_partition(&self, ledger: &PartitionLedger) -> Result<(), StorageError>;

    /// Read a partition ledger.
    ///
    /// Returns `None` if the partition was never initialized.
    async fn load_partition(&self, key: &str) -> Result<Option<PartitionLedger>, StorageError>;

    /// Keys of every stored partition, sorted.
    async fn partition_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Apply an update to one partition as a single transaction.
    ///
    /// Returns `false` (and changes nothing) if the partition does not exist.
    async fn apply_update(&self, key: &str, update: &LedgerUpdate) -> Result<bool, StorageError>;

    /// Keys of partitions with a scheduled frame in `[start, end]`, sorted.
    ///
    /// A `None` start matches every scheduled frame up to `end`.
    async fn scheduled_partitions(
        &self,
        start: Option<&FrameId>,
        end: &FrameId,
    ) -> Result<Vec<String>, StorageError>;

    /// Read the controller record, if the scheduler ever ran.
    async fn load_controller(&self) -> Result<Option<ControllerLedger>, StorageError>;

    /// Write the controller record, replacing the previous one.
    async fn save_controller(&self, controller: &ControllerLedger) -> Result<(), StorageError>;
}

/// Open the store selected by `config`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn LedgerStore>, StorageError> {
    match config.backend {
        Backend::Sqlite => {
            tracing::info!("Opening SQLite ledger at {}", config.database.display());
            Ok(Arc::new(SqliteStore::open(&config.database).await?))
        }
        Backend::Memory => {
            tracing::info!("Using in-memory ledger");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
