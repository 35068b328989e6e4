//! Ready-watermark resolution for Ager.
//!
//! Given a partition's ledger, the resolver:
//! - merges the intervals of every frame into a minimal covering set
//! - reads the watermark off the merged interval that contains the anchor
//! - plans a compaction of frames that lie entirely behind the watermark
//!
//! Compaction walks frames in id order and stops at the first frame holding
//! anything above the watermark. The frames before that point are retracted
//! and replaced by one summary interval `[anchor, watermark]` filed under the
//! newest of them, so resolving the compacted ledger yields the same
//! watermark. Frames past the stopping point are left alone even if they are
//! individually behind.

use crate::ledger::{LedgerError, LedgerUpdate, PartitionLedger};
use crate::merge::IntervalSet;
use ager_types::{FrameId, Interval};

/// Outcome of resolving one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Watermark last surfaced to callers (`anchor - 1` when none yet).
    pub previous: i64,
    /// Highest key reached from the anchor with no gaps.
    pub watermark: i64,
    /// Merged view of every interval in the ledger.
    pub merged: Vec<Interval>,
    /// Frames to retract, if compaction would change anything.
    pub compaction: Option<Compaction>,
}

impl Resolution {
    /// Keys that became ready since `previous`, if any.
    pub fn ready_range(&self) -> Option<Interval> {
        if self.watermark > self.previous {
            Interval::new(self.previous + 1, self.watermark).ok()
        } else {
            None
        }
    }

    /// Check if the watermark moved past `previous`.
    pub fn advanced(&self) -> bool {
        self.watermark > self.previous
    }
}

/// Frames proven redundant, and the interval that replaces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    /// Compacted frames with the exact intervals observed in each.
    pub frames: Vec<(FrameId, Vec<Interval>)>,
    /// Frame that receives the summary interval.
    pub retain_in: FrameId,
    /// `[anchor, watermark]`.
    pub retained: Interval,
}

impl Compaction {
    /// Ids of the compacted frames.
    pub fn frame_ids(&self) -> impl Iterator<Item = &FrameId> {
        self.frames.iter().map(|(frame, _)| frame)
    }

    /// The field-level update carrying out this compaction.
    pub fn to_update(&self) -> LedgerUpdate {
        LedgerUpdate {
            retract: self.frames.clone(),
            append: vec![(self.retain_in.clone(), self.retained)],
            ..LedgerUpdate::default()
        }
    }
}

/// Resolve a ledger.
///
/// `previous` is the last watermark reported for this partition; `None`
/// means nothing was reported yet, so the anchor itself counts as new.
pub fn resolve(ledger: &PartitionLedger, previous: Option<i64>) -> Result<Resolution, LedgerError> {
    let merged: IntervalSet = ledger.intervals().copied().collect();

    let head = merged.covering(ledger.anchor).ok_or_else(|| {
        LedgerError::corrupt(
            &ledger.key,
            format!("anchor {} is not covered by any interval", ledger.anchor),
        )
    })?;
    let watermark = head.hi();

    let previous = previous.unwrap_or_else(|| ledger.anchor.saturating_sub(1));
    let compaction = plan_compaction(ledger, watermark);

    Ok(Resolution {
        previous,
        watermark,
        merged: merged.into_vec(),
        compaction,
    })
}

/// Check if recording `interval` would move `watermark` forward.
pub fn extends(watermark: i64, interval: &Interval) -> bool {
    interval.lo() <= watermark.saturating_add(1) && interval.hi() > watermark
}

fn plan_compaction(ledger: &PartitionLedger, watermark: i64) -> Option<Compaction> {
    let behind: Vec<(FrameId, Vec<Interval>)> = ledger
        .frames
        .iter()
        .take_while(|(_, intervals)| intervals.iter().all(|iv| iv.hi() <= watermark))
        .map(|(frame, intervals)| (frame.clone(), intervals.clone()))
        .collect();

    let (retain_in, last) = behind.last()?;
    // The anchor is covered, so anchor <= watermark.
    let retained = Interval::new(ledger.anchor, watermark).ok()?;

    if behind.len() == 1 && last.as_slice() == [retained] {
        return None;
    }

    Some(Compaction {
        retain_in: retain_in.clone(),
        retained,
        frames: behind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const F1: &str = "20210304050000";
    const F2: &str = "20210304060000";
    const F3: &str = "20210304070000";

    fn iv(lo: i64, hi: i64) -> Interval {
        Interval::new(lo, hi).unwrap()
    }

    fn frame(s: &str) -> FrameId {
        s.parse().unwrap()
    }

    fn ledger_with(anchor: i64, entries: &[(&str, Interval)]) -> PartitionLedger {
        let mut ledger = PartitionLedger::new("p", anchor, 3600, frame(F1));
        for (f, interval) in entries {
            ledger.apply(&LedgerUpdate::append(frame(f), *interval));
        }
        ledger
    }

    #[test]
    fn anchor_alone_resolves_to_anchor() {
        let ledger = ledger_with(1, &[]);
        let res = resolve(&ledger, None).unwrap();
        assert_eq!(res.watermark, 1);
        assert_eq!(res.previous, 0);
        assert_eq!(res.ready_range(), Some(iv(1, 1)));
        assert_eq!(res.compaction, None);
    }

    #[test]
    fn gap_holds_watermark() {
        let ledger = ledger_with(1, &[(F1, iv(1, 5)), (F1, iv(10, 15))]);
        let res = resolve(&ledger, None).unwrap();
        assert_eq!(res.watermark, 5);
        assert_eq!(res.merged, vec![iv(1, 5), iv(10, 15)]);
    }

    #[test]
    fn filling_gap_releases_watermark() {
        let ledger = ledger_with(1, &[(F1, iv(1, 5)), (F2, iv(10, 15)), (F3, iv(6, 9))]);
        let res = resolve(&ledger, Some(5)).unwrap();
        assert_eq!(res.watermark, 15);
        assert_eq!(res.ready_range(), Some(iv(6, 15)));
    }

    #[test]
    fn no_progress_means_no_range() {
        let ledger = ledger_with(1, &[(F1, iv(2, 10)), (F2, iv(20, 25))]);
        let res = resolve(&ledger, Some(10)).unwrap();
        assert!(!res.advanced());
        assert_eq!(res.ready_range(), None);
    }

    #[test]
    fn intervals_below_anchor_do_not_hide_watermark() {
        let ledger = ledger_with(100, &[(F1, iv(-5, 3)), (F2, iv(101, 140))]);
        let res = resolve(&ledger, None).unwrap();
        assert_eq!(res.watermark, 140);
        assert_eq!(res.ready_range(), Some(iv(100, 140)));
    }

    #[test]
    fn missing_anchor_is_corrupt() {
        let mut ledger = ledger_with(1, &[(F2, iv(5, 9))]);
        ledger.frames.remove(&frame(F1));
        let err = resolve(&ledger, None).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { ref key, .. } if key == "p"));
    }

    #[test]
    fn compaction_collapses_behind_prefix() {
        let ledger = ledger_with(1, &[(F1, iv(2, 10)), (F2, iv(11, 20)), (F3, iv(30, 35))]);
        let res = resolve(&ledger, None).unwrap();
        assert_eq!(res.watermark, 20);

        let compaction = res.compaction.unwrap();
        assert_eq!(
            compaction.frame_ids().cloned().collect::<Vec<_>>(),
            vec![frame(F1), frame(F2)]
        );
        assert_eq!(compaction.retain_in, frame(F2));
        assert_eq!(compaction.retained, iv(1, 20));

        let mut compacted = ledger.clone();
        compacted.apply(&compaction.to_update());
        assert!(!compacted.frames.contains_key(&frame(F1)));
        assert_eq!(compacted.frames[&frame(F2)], vec![iv(1, 20)]);
        assert_eq!(compacted.frames[&frame(F3)], vec![iv(30, 35)]);
    }

    #[test]
    fn compaction_stops_at_first_frame_ahead() {
        // F2 is ahead of the watermark, so F3 stays even though it is behind.
        let ledger = ledger_with(1, &[(F1, iv(2, 10)), (F2, iv(20, 25)), (F3, iv(4, 6))]);
        let res = resolve(&ledger, None).unwrap();
        let compaction = res.compaction.unwrap();
        assert_eq!(
            compaction.frame_ids().cloned().collect::<Vec<_>>(),
            vec![frame(F1)]
        );
    }

    #[test]
    fn compaction_skipped_when_already_compact() {
        let mut ledger = ledger_with(1, &[(F1, iv(2, 10))]);
        let first = resolve(&ledger, None).unwrap();
        ledger.apply(&first.compaction.unwrap().to_update());
        assert_eq!(ledger.frames[&frame(F1)], vec![iv(1, 10)]);

        let second = resolve(&ledger, Some(10)).unwrap();
        assert_eq!(second.compaction, None);
    }

    #[test]
    fn compaction_preserves_watermark() {
        let entries = [
            (F1, iv(2, 4)),
            (F1, iv(-10, -8)),
            (F2, iv(5, 9)),
            (F2, iv(12, 12)),
            (F3, iv(10, 11)),
            (F3, iv(50, 60)),
        ];
        let mut ledger = ledger_with(1, &entries);
        let before = resolve(&ledger, None).unwrap();
        assert_eq!(before.watermark, 12);

        // Compact repeatedly until nothing is left to do.
        let mut current = before.clone();
        while let Some(compaction) = current.compaction.take() {
            ledger.apply(&compaction.to_update());
            current = resolve(&ledger, None).unwrap();
            assert_eq!(current.watermark, before.watermark);
        }

        ledger.apply(&LedgerUpdate::append(frame(F3), iv(13, 49)));
        assert_eq!(resolve(&ledger, None).unwrap().watermark, 60);
    }

    #[test]
    fn watermark_is_monotonic_under_any_order() {
        let ranges = [iv(20, 25), iv(2, 10), iv(40, 45), iv(11, 19), iv(26, 39)];
        let frames = [F1, F2, F3];
        let mut ledger = ledger_with(1, &[]);
        let mut last = resolve(&ledger, None).unwrap().watermark;
        for (i, range) in ranges.iter().enumerate() {
            ledger.apply(&LedgerUpdate::append(frame(frames[i % 3]), *range));
            let res = resolve(&ledger, None).unwrap();
            assert!(res.watermark >= last);
            last = res.watermark;
            if let Some(compaction) = res.compaction {
                ledger.apply(&compaction.to_update());
            }
        }
        assert_eq!(last, 45);
    }

    #[test]
    fn extends_checks_progress() {
        assert!(extends(10, &iv(11, 19)));
        assert!(extends(10, &iv(5, 12)));
        assert!(!extends(10, &iv(12, 19)));
        assert!(!extends(10, &iv(3, 10)));
        assert!(!extends(i64::MAX, &iv(0, i64::MAX)));
    }
}
