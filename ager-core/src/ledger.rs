//! Ledger records for Ager.
//!
//! Two kinds of record are persisted:
//! - [`PartitionLedger`] - one per partition key: the anchor, the frame
//!   length, the intervals received per frame and the frames scheduled for
//!   the next scheduler pass
//! - [`ControllerLedger`] - a single record tracking how far the scheduler
//!   has processed and the last watermark it reported per partition
//!
//! Mutations of a partition are expressed as a [`LedgerUpdate`]. A store
//! applies an update as one atomic transaction, and every operation in it is
//! field-level (add to a set, remove exact values, drop a field) so that two
//! writers touching the same partition do not lose each other's intervals.

use crate::frame::is_real_time;
use ager_types::{FrameId, Interval};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while interpreting a ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The record cannot be used to compute a watermark.
    #[error("corrupt ledger for partition {key}: {reason}")]
    Corrupt {
        /// Partition key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::Corrupt`].
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        LedgerError::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Everything recorded for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionLedger {
    /// Partition key.
    pub key: String,
    /// Start of the partition's key space; the watermark grows from here.
    pub anchor: i64,
    /// Seconds per frame, 0 or 1 for real time. Fixed at init.
    pub frame_length: u32,
    /// Intervals received, filed by the frame they arrived in.
    pub frames: BTreeMap<FrameId, Vec<Interval>>,
    /// Frames that advanced the watermark and await a scheduler pass.
    pub schedule: BTreeSet<FrameId>,
    /// Last watermark handed back by a real-time record call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<i64>,
}

impl PartitionLedger {
    /// A fresh ledger holding only the anchor interval, filed under `frame`.
    pub fn new(key: impl Into<String>, anchor: i64, frame_length: u32, frame: FrameId) -> Self {
        let mut frames = BTreeMap::new();
        frames.insert(frame, vec![Interval::point(anchor)]);
        Self {
            key: key.into(),
            anchor,
            frame_length,
            frames,
            schedule: BTreeSet::new(),
            reported: None,
        }
    }

    /// Check if this partition resolves on every record.
    pub fn is_real_time(&self) -> bool {
        is_real_time(self.frame_length)
    }

    /// Scheduled frames up to and including `end`.
    pub fn scheduled_through(&self, end: &FrameId) -> Vec<FrameId> {
        self.schedule.range(..=end.clone()).cloned().collect()
    }

    /// Every interval in every frame, in frame order.
    pub fn intervals(&self) -> impl Iterator<Item = &Interval> {
        self.frames.values().flatten()
    }

    /// Apply an update in place, with the same semantics a store provides.
    pub fn apply(&mut self, update: &LedgerUpdate) {
        for (frame, intervals) in &update.retract {
            if let Some(list) = self.frames.get_mut(frame) {
                list.retain(|iv| !intervals.contains(iv));
            }
        }
        for (frame, interval) in &update.append {
            let list = self.frames.entry(frame.clone()).or_default();
            if !list.contains(interval) {
                list.push(*interval);
            }
        }
        self.frames.retain(|_, list| !list.is_empty());

        for frame in &update.unschedule {
            self.schedule.remove(frame);
        }
        self.schedule.extend(update.schedule.iter().cloned());

        if let Some(reported) = update.reported {
            self.reported = Some(self.reported.map_or(reported, |r| r.max(reported)));
        }
    }
}

/// An atomic set of field-level changes to one partition.
///
/// Application order: retractions, appends, drop emptied frames, schedule
/// removals, schedule additions, `reported` advance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerUpdate {
    /// Intervals to add (set semantics: duplicates within a frame are ignored).
    pub append: Vec<(FrameId, Interval)>,
    /// Exact intervals to remove from a frame.
    pub retract: Vec<(FrameId, Vec<Interval>)>,
    /// Frames to add to the schedule.
    pub schedule: Vec<FrameId>,
    /// Exact frames to remove from the schedule.
    pub unschedule: Vec<FrameId>,
    /// Raise `reported` to at least this value.
    pub reported: Option<i64>,
}

impl LedgerUpdate {
    /// An update that files one interval under `frame`.
    pub fn append(frame: FrameId, interval: Interval) -> Self {
        Self {
            append: vec![(frame, interval)],
            ..Self::default()
        }
    }

    /// Merge another update into this one.
    pub fn merge(mut self, other: LedgerUpdate) -> Self {
        self.append.extend(other.append);
        self.retract.extend(other.retract);
        self.schedule.extend(other.schedule);
        self.unschedule.extend(other.unschedule);
        self.reported = match (self.reported, other.reported) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self
    }

    /// Check if applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.append.is_empty()
            && self.retract.is_empty()
            && self.schedule.is_empty()
            && self.unschedule.is_empty()
            && self.reported.is_none()
    }
}

/// Scheduler bookkeeping, stored once under the key `"ctrl"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerLedger {
    /// Last frame the scheduler fully processed.
    pub updated_frame_id: FrameId,
    /// Last reported watermark per partition; `None` after a failed resolution.
    pub tasks: BTreeMap<String, Option<i64>>,
}

impl ControllerLedger {
    /// Record key of the controller.
    pub const KEY: &'static str = "ctrl";

    /// A controller that has processed nothing past `frame`.
    pub fn new(updated_frame_id: FrameId) -> Self {
        Self {
            updated_frame_id,
            tasks: BTreeMap::new(),
        }
    }

    /// Partitions whose last resolution failed.
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .iter()
            .filter(|(_, watermark)| watermark.is_none())
            .map(|(key, _)| key.as_str())
    }
}
