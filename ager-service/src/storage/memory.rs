//! In-memory storage backend.

use super::LedgerStore;
use crate::error::StorageError;
use ager_core::{ControllerLedger, LedgerUpdate, PartitionLedger};
use ager_types::FrameId;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// Ledger store kept in process memory.
///
/// Each partition sits behind its own map shard lock, so an update to one
/// partition is atomic with respect to other writers of that partition.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: DashMap<String, PartitionLedger>,
    controller: RwLock<Option<ControllerLedger>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_partition(&self, ledger: &PartitionLedger) -> Result<(), StorageError> {
        self.partitions.insert(ledger.key.clone(), ledger.clone());
        Ok(())
    }

    async fn load_partition(&self, key: &str) -> Result<Option<PartitionLedger>, StorageError> {
        Ok(self.partitions.get(key).map(|entry| entry.value().clone()))
    }

    async fn partition_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.partitions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    async fn apply_update(&self, key: &str, update: &LedgerUpdate) -> Result<bool, StorageError> {
        match self.partitions.get_mut(key) {
            Some(mut entry) => {
                entry.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scheduled_partitions(
        &self,
        start: Option<&FrameId>,
        end: &FrameId,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .partitions
            .iter()
            .filter(|entry| {
                entry
                    .schedule
                    .iter()
                    .any(|frame| frame <= end && start.map_or(true, |s| frame >= s))
            })
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn load_controller(&self) -> Result<Option<ControllerLedger>, StorageError> {
        Ok(self.controller.read().await.clone())
    }

    async fn save_controller(&self, controller: &ControllerLedger) -> Result<(), StorageError> {
        *self.controller.write().await = Some(controller.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ager_types::Interval;

    fn frame(s: &str) -> FrameId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn create_and_load_partition() {
        let store = MemoryStore::new();
        let ledger = PartitionLedger::new("p1", 1, 3600, frame("20210304050000"));
        store.create_partition(&ledger).await.unwrap();

        assert_eq!(store.load_partition("p1").await.unwrap(), Some(ledger));
        assert_eq!(store.load_partition("p2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn apply_update_to_missing_partition_is_rejected() {
        let store = MemoryStore::new();
        let update = LedgerUpdate::append(frame("20210304050000"), Interval::point(3));
        assert!(!store.apply_update("nope", &update).await.unwrap());
        assert!(store.partition_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduled_partitions_filters_by_frame_range() {
        let store = MemoryStore::new();
        let f1 = frame("20210304050000");
        let f2 = frame("20210304060000");
        for key in ["b", "a", "c"] {
            store
                .create_partition(&PartitionLedger::new(key, 1, 3600, f1.clone()))
                .await
                .unwrap();
        }
        for key in ["b", "a"] {
            let update = LedgerUpdate {
                schedule: vec![f2.clone()],
                ..LedgerUpdate::default()
            };
            assert!(store.apply_update(key, &update).await.unwrap());
        }

        assert_eq!(store.scheduled_partitions(None, &f2).await.unwrap(), vec!["a", "b"]);
        assert_eq!(
            store.scheduled_partitions(Some(&f2), &f2).await.unwrap(),
            vec!["a", "b"]
        );
        assert!(store.scheduled_partitions(None, &f1).await.unwrap().is_empty());

        // An entry before `start` is outside an explicit range.
        let f3 = frame("20210304070000");
        assert!(store
            .scheduled_partitions(Some(&f3), &f3)
            .await
            .unwrap()
            .is_empty());
        // Reversed range matches nothing.
        assert!(store
            .scheduled_partitions(Some(&f3), &f1)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.partition_keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn controller_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load_controller().await.unwrap(), None);

        let mut ctrl = ControllerLedger::new(frame("20210304050000"));
        ctrl.tasks.insert("p1".into(), Some(50));
        store.save_controller(&ctrl).await.unwrap();

        assert_eq!(store.load_controller().await.unwrap(), Some(ctrl));
    }
}
