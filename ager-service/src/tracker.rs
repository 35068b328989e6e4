//! The Ager facade: partition initialization and range recording.
//!
//! `Ager` ties a [`LedgerStore`] to a [`Clock`] and the configured minimum
//! frame length. Each call loads a snapshot, computes what to persist with
//! `ager-core`, and writes it back as one [`LedgerUpdate`].

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{AgerError, Result};
use crate::metrics::AgerMetrics;
use crate::storage::{open_store, LedgerStore};
use ager_core::frame::{bucket, is_real_time};
use ager_core::resolver::{extends, resolve};
use ager_core::{ControllerLedger, LedgerUpdate, PartitionLedger};
use ager_types::{FrameId, Interval};
use std::sync::Arc;

/// Ready-watermark tracker over a ledger store.
pub struct Ager {
    pub(crate) store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    pub(crate) min_frame_length: u32,
    pub(crate) metrics: AgerMetrics,
}

impl std::fmt::Debug for Ager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ager")
            .field("min_frame_length", &self.min_frame_length)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Ager {
    /// Create a tracker reading the system clock.
    pub fn new(store: Arc<dyn LedgerStore>, min_frame_length: u32) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            min_frame_length,
            metrics: AgerMetrics::default(),
        }
    }

    /// Open the configured store and build a tracker on it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.storage).await?;
        Ok(Self::new(store, config.frames.min_frame_length))
    }

    /// Replace the clock (tests drive time with a `ManualClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the configured minimum frame length.
    pub fn min_frame_length(&self) -> u32 {
        self.min_frame_length
    }

    /// Get the operational counters.
    pub fn metrics(&self) -> &AgerMetrics {
        &self.metrics
    }

    /// Get the underlying store.
    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Id of the frame `now` falls in at the given length.
    pub(crate) fn current_frame(&self, frame_length: u32) -> Result<FrameId> {
        Ok(bucket(self.clock.now(), frame_length)?)
    }

    /// Create (or reset) the ledger of a partition.
    ///
    /// The ledger starts with the single interval `[start_key, start_key]`
    /// filed under the current frame.
    pub async fn init_partition(&self, key: &str, start_key: i64, frame_length: u32) -> Result<()> {
        if !is_real_time(frame_length)
            && !is_real_time(self.min_frame_length)
            && frame_length % self.min_frame_length != 0
        {
            return Err(AgerError::InvalidConfig {
                frame_length,
                min_frame_length: self.min_frame_length,
            });
        }

        match self.store.load_partition(key).await {
            Ok(Some(_)) => {
                tracing::warn!(partition = key, "Re-initializing partition, previous ledger discarded");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    partition = key,
                    "Could not read existing ledger before re-init: {}",
                    e
                );
            }
        }

        let frame = self.current_frame(frame_length)?;
        let ledger = PartitionLedger::new(key, start_key, frame_length, frame);
        self.store.create_partition(&ledger).await?;

        tracing::info!(
            partition = key,
            anchor = start_key,
            frame_length,
            "Partition initialized"
        );
        Ok(())
    }

    /// Record that keys `start..=end` have arrived for a partition.
    ///
    /// Real-time partitions resolve immediately and return the range that
    /// became ready, if any. Batched partitions only file the range and
    /// return `None`; the scheduler reports them later.
    pub async fn record_range(&self, key: &str, start: i64, end: i64) -> Result<Option<Interval>> {
        let interval =
            Interval::new(start, end).map_err(|_| AgerError::InvalidRange { start, end })?;

        let ledger = self
            .store
            .load_partition(key)
            .await?
            .ok_or_else(|| uninitialized(key))?;

        let frame = self.current_frame(ledger.frame_length)?;
        let append = LedgerUpdate::append(frame.clone(), interval);
        AgerMetrics::incr(&self.metrics.ranges_recorded);

        if ledger.is_real_time() {
            self.record_real_time(ledger, frame, interval, append).await
        } else {
            // The range is filed either way; an unresolvable ledger is left
            // for the scheduler to flag.
            let mut update = append;
            match resolve(&ledger, None) {
                Ok(snapshot) => {
                    if extends(snapshot.watermark, &interval) {
                        update.schedule.push(frame.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(partition = key, "Recording without scheduling: {}", e);
                }
            }
            self.apply(key, &update).await?;

            tracing::debug!(
                partition = key,
                range = %interval,
                frame = %frame,
                scheduled = !update.schedule.is_empty(),
                "Range recorded"
            );
            Ok(None)
        }
    }

    async fn record_real_time(
        &self,
        ledger: PartitionLedger,
        frame: FrameId,
        interval: Interval,
        append: LedgerUpdate,
    ) -> Result<Option<Interval>> {
        let mut after = ledger.clone();
        after.apply(&append);
        let resolution = resolve(&after, ledger.reported)?;

        let mut update = match &resolution.compaction {
            Some(compaction) => {
                AgerMetrics::add(&self.metrics.frames_compacted, compaction.frames.len());
                // Compaction already accounts for the new interval when it
                // retracts it; re-appending would undo that.
                let absorbed = compaction
                    .frames
                    .iter()
                    .any(|(f, ivs)| *f == frame && ivs.contains(&interval));
                if absorbed {
                    compaction.to_update()
                } else {
                    append.merge(compaction.to_update())
                }
            }
            None => append,
        };
        update.reported = Some(resolution.watermark);
        self.apply(&ledger.key, &update).await?;
        AgerMetrics::incr(&self.metrics.partitions_resolved);

        let ready = resolution.ready_range();
        if let Some(range) = ready {
            AgerMetrics::incr(&self.metrics.ranges_reported);
            tracing::debug!(partition = %ledger.key, ready = %range, "Watermark advanced");
        }
        Ok(ready)
    }

    /// Read a partition's ledger.
    pub async fn ledger(&self, key: &str) -> Result<Option<PartitionLedger>> {
        Ok(self.store.load_partition(key).await?)
    }

    /// Read the scheduler's controller record.
    pub async fn controller(&self) -> Result<Option<ControllerLedger>> {
        Ok(self.store.load_controller().await?)
    }

    pub(crate) async fn apply(&self, key: &str, update: &LedgerUpdate) -> Result<()> {
        if self.store.apply_update(key, update).await? {
            Ok(())
        } else {
            Err(uninitialized(key))
        }
    }
}

pub(crate) fn uninitialized(key: &str) -> AgerError {
    AgerError::Uninitialized {
        key: key.to_string(),
    }
}
