//! Operational counters and their Prometheus text rendering.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operational metrics for monitoring ledger activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct AgerMetrics {
    /// Ranges accepted by `record_range`.
    pub ranges_recorded: AtomicU64,
    /// Partition resolutions that produced a watermark.
    pub partitions_resolved: AtomicU64,
    /// Partition resolutions that failed (corrupt or missing ledgers).
    pub resolution_failures: AtomicU64,
    /// Frames retracted by compaction.
    pub frames_compacted: AtomicU64,
    /// Completed scheduler runs.
    pub scheduler_runs: AtomicU64,
    /// Ready ranges handed back to callers.
    pub ranges_reported: AtomicU64,
}

impl AgerMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Render every counter in Prometheus text format.
    pub fn render(&self) -> String {
        let counters = [
            (
                "ager_ranges_recorded_total",
                "Total ranges recorded",
                &self.ranges_recorded,
            ),
            (
                "ager_partitions_resolved_total",
                "Total successful partition resolutions",
                &self.partitions_resolved,
            ),
            (
                "ager_resolution_failures_total",
                "Total failed partition resolutions",
                &self.resolution_failures,
            ),
            (
                "ager_frames_compacted_total",
                "Total frames retracted by compaction",
                &self.frames_compacted,
            ),
            (
                "ager_scheduler_runs_total",
                "Total completed scheduler runs",
                &self.scheduler_runs,
            ),
            (
                "ager_ranges_reported_total",
                "Total ready ranges reported",
                &self.ranges_reported,
            ),
        ];

        let mut body = format!(
            "# HELP ager_info Build information\n# TYPE ager_info gauge\nager_info{{version=\"{}\"}} 1\n",
            env!("CARGO_PKG_VERSION")
        );
        for (name, help, counter) in counters {
            let _ = write!(
                body,
                "\n# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                counter.load(Ordering::Relaxed)
            );
        }
        body
    }
}
