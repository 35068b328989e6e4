//! Interval merging for Ager.
//!
//! This module keeps a minimal covering set of closed integer intervals:
//! - Sorted ascending by lower bound
//! - No two members overlap or touch (a gap of at least one key separates them)
//! - Inserting returns a fresh list, the input is left alone
//!
//! The resolver feeds every interval of a partition through [`insert`] to
//! rebuild its merged view, so the order intervals arrive in never matters.

use ager_types::Interval;

/// Insert `new` into an already-minimal sorted list, returning the new list.
///
/// Every existing interval that overlaps or is adjacent to `new` is folded
/// into a single spanning interval; the rest are copied unchanged.
pub fn insert(existing: &[Interval], new: Interval) -> Vec<Interval> {
    let mut merged = Vec::with_capacity(existing.len() + 1);
    let mut pending = new;
    let mut placed = false;

    for current in existing {
        if current.touches(&pending) {
            pending = pending.span(current);
        } else if current.hi() < pending.lo() {
            merged.push(*current);
        } else {
            // First interval strictly above the merged span.
            if !placed {
                merged.push(pending);
                placed = true;
            }
            merged.push(*current);
        }
    }

    if !placed {
        merged.push(pending);
    }

    merged
}

/// Owned minimal interval set built on [`insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interval, merging as needed.
    pub fn insert(&mut self, interval: Interval) {
        self.intervals = insert(&self.intervals, interval);
    }

    /// The member interval containing `point`, if any.
    pub fn covering(&self, point: i64) -> Option<Interval> {
        let idx = self.intervals.partition_point(|iv| iv.hi() < point);
        self.intervals
            .get(idx)
            .copied()
            .filter(|iv| iv.contains(point))
    }

    /// Merged intervals in ascending order.
    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    /// Number of disjoint intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Check if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Consume the set, returning the merged intervals.
    pub fn into_vec(self) -> Vec<Interval> {
        self.intervals
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        let mut set = IntervalSet::new();
        for interval in iter {
            set.insert(interval);
        }
        set
    }
}
