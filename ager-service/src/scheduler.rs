//! Batched watermark reporting.
//!
//! The scheduler resolves batched partitions and reports how far each one
//! advanced since the last run. Its progress lives in the controller record:
//! the last frame it processed and the last watermark reported per partition.
//!
//! A run is one of two scans:
//! - cold start (no controller yet): every partition is resolved and reported
//!   from its anchor
//! - warm: only partitions with a schedule entry at or before `end` (within
//!   `[start, end]` when a start frame is given), plus those whose last
//!   resolution failed, are resolved; each reports the keys past its
//!   previous watermark
//!
//! Schedule entries are filed at each partition's own frame length, so a
//! due entry can predate the controller's last processed frame. Entries are
//! removed once resolved, which makes every remaining entry `<= end` due.
//!
//! A partition that fails to resolve is logged, recorded as unresolved and
//! retried on the next warm run. It never aborts the scan.

use crate::error::Result;
use crate::metrics::AgerMetrics;
use crate::tracker::{uninitialized, Ager};
use ager_core::frame::is_real_time;
use ager_core::{resolve, ControllerLedger, LedgerUpdate, Resolution};
use ager_types::{FrameId, Interval};
use std::collections::{BTreeMap, BTreeSet};

/// Which partitions a scheduler run visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// No controller exists: visit every partition.
    ColdStart,
    /// Visit scheduled partitions up to the end frame and unresolved ones.
    Warm {
        /// First frame to scan; `None` scans every pending entry.
        start: Option<FrameId>,
    },
}

impl Ager {
    /// Run the scheduler once.
    ///
    /// `end` defaults to the current frame at the minimum frame length.
    /// Without `start`, every schedule entry up to `end` is due. Returns the ready range
    /// of every partition whose watermark advanced, keyed by partition.
    ///
    /// Does nothing when the minimum frame length means real time.
    pub async fn run_scheduler(
        &self,
        start: Option<FrameId>,
        end: Option<FrameId>,
    ) -> Result<BTreeMap<String, Interval>> {
        if is_real_time(self.min_frame_length) {
            tracing::debug!("Scheduler skipped: real-time configuration");
            return Ok(BTreeMap::new());
        }

        let end = match end {
            Some(end) => end,
            None => self.current_frame(self.min_frame_length)?,
        };

        let (mut controller, mode) = match self.store.load_controller().await? {
            None => (ControllerLedger::new(end.clone()), ScanMode::ColdStart),
            Some(controller) => (controller, ScanMode::Warm { start }),
        };

        let candidates = self.candidates(&controller, &mode, &end).await?;
        tracing::info!(
            mode = ?mode,
            end = %end,
            partitions = candidates.len(),
            "Scheduler run started"
        );

        let mut ready = BTreeMap::new();
        for key in candidates {
            let previous = match mode {
                ScanMode::ColdStart => None,
                ScanMode::Warm { .. } => controller.tasks.get(&key).copied().flatten(),
            };

            match self.resolve_partition(&key, previous, &end).await {
                Ok(resolution) => {
                    if let Some(range) = resolution.ready_range() {
                        tracing::debug!(partition = %key, ready = %range, "Watermark advanced");
                        AgerMetrics::incr(&self.metrics.ranges_reported);
                        ready.insert(key.clone(), range);
                    }
                    controller.tasks.insert(key, Some(resolution.watermark));
                }
                Err(e) => {
                    tracing::error!(partition = %key, "Resolution failed: {}", e);
                    AgerMetrics::incr(&self.metrics.resolution_failures);
                    controller.tasks.insert(key, None);
                }
            }
        }

        controller.updated_frame_id = controller.updated_frame_id.clone().max(end);
        self.store.save_controller(&controller).await?;
        AgerMetrics::incr(&self.metrics.scheduler_runs);

        tracing::info!(
            advanced = ready.len(),
            updated_frame_id = %controller.updated_frame_id,
            "Scheduler run finished"
        );
        Ok(ready)
    }

    async fn candidates(
        &self,
        controller: &ControllerLedger,
        mode: &ScanMode,
        end: &FrameId,
    ) -> Result<BTreeSet<String>> {
        match mode {
            ScanMode::ColdStart => Ok(self.store.partition_keys().await?.into_iter().collect()),
            ScanMode::Warm { start } => {
                let mut keys: BTreeSet<String> =
                    controller.unresolved().map(str::to_string).collect();
                keys.extend(self.store.scheduled_partitions(start.as_ref(), end).await?);
                Ok(keys)
            }
        }
    }

    /// Resolve one partition, compact it and clear its schedule through `end`.
    async fn resolve_partition(
        &self,
        key: &str,
        previous: Option<i64>,
        end: &FrameId,
    ) -> Result<Resolution> {
        let ledger = self
            .store
            .load_partition(key)
            .await?
            .ok_or_else(|| uninitialized(key))?;

        let resolution = resolve(&ledger, previous)?;

        let mut update = LedgerUpdate {
            unschedule: ledger.scheduled_through(end),
            ..LedgerUpdate::default()
        };
        if let Some(compaction) = &resolution.compaction {
            AgerMetrics::add(&self.metrics.frames_compacted, compaction.frames.len());
            update = update.merge(compaction.to_update());
        }
        if !update.is_empty() {
            self.apply(key, &update).await?;
        }

        AgerMetrics::incr(&self.metrics.partitions_resolved);
        Ok(resolution)
    }
}
