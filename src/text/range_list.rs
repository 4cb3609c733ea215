//! Sorted, non-overlapping range collections that track document edits.

use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::delta::{Delta, shift_point};
use super::document::Document;
use super::position::Position;
use super::range::Range;
use crate::event::Subscription;

/// What a [`RangeList`] does after shifting its ranges for an edit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RangeListPolicy {
    /// Merge ranges that the edit made overlap.
    pub merge_on_change: bool,
    /// Drop ranges that the edit collapsed.
    pub drop_empty: bool,
}

impl RangeListPolicy {
    #[must_use]
    pub fn with_merge_on_change(mut self, merge: bool) -> Self {
        self.merge_on_change = merge;
        self
    }

    #[must_use]
    pub fn with_drop_empty(mut self, drop_empty: bool) -> Self {
        self.drop_empty = drop_empty;
        self
    }
}

#[derive(Default)]
struct Shared {
    ranges: RefCell<Vec<Range>>,
    insert_right: Cell<bool>,
    policy: Cell<RangeListPolicy>,
}

impl Shared {
    fn on_delta(&self, delta: &Delta) {
        let insert_right = self.insert_right.get();
        let policy = self.policy.get();
        let mut ranges = self.ranges.borrow_mut();
        let edit_row = delta.range().start.row;
        for range in ranges.iter_mut().filter(|range| range.end.row >= edit_row) {
            range.start = shift_point(range.start, delta, insert_right);
            range.end = shift_point(range.end, delta, insert_right);
        }
        if policy.drop_empty {
            ranges.retain(|range| !range.is_empty());
        }
        if policy.merge_on_change {
            merge_sorted(&mut ranges);
        }
    }
}

/// Ordered list of ranges.
///
/// Ranges are kept sorted by start. [`add`](Self::add) replaces whatever
/// the new range overlaps, so the list stays non-overlapping as long as it
/// is only populated through it.
pub struct RangeList {
    shared: Rc<Shared>,
    subscription: Option<Subscription<Delta>>,
}

impl RangeList {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(RangeListPolicy::default())
    }

    #[must_use]
    pub fn with_policy(policy: RangeListPolicy) -> Self {
        let shared = Shared::default();
        shared.policy.set(policy);
        Self {
            shared: Rc::new(shared),
            subscription: None,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RangeListPolicy {
        self.shared.policy.get()
    }

    pub fn set_policy(&self, policy: RangeListPolicy) {
        self.shared.policy.set(policy);
    }

    pub fn set_insert_right(&self, insert_right: bool) {
        self.shared.insert_right.set(insert_right);
    }

    #[must_use]
    pub fn ranges(&self) -> Ref<'_, [Range]> {
        Ref::map(self.shared.ranges.borrow(), Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ranges.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locate `pos` in the list, scanning from `start_index`.
    ///
    /// `Ok(i)` means range `i` contains the point. `Err(i)` is the index a
    /// range starting at the point would be inserted at. With
    /// `exclude_edges`, touching a range's start or end does not count as
    /// containment unless the range is empty.
    pub fn point_index(
        &self,
        pos: Position,
        exclude_edges: bool,
        start_index: usize,
    ) -> Result<usize, usize> {
        let ranges = self.shared.ranges.borrow();
        point_index_in(&ranges, pos, exclude_edges, start_index)
    }

    /// Insert `range`, removing and returning every range it overlaps.
    pub fn add(&mut self, range: Range) -> Vec<Range> {
        let mut ranges = self.shared.ranges.borrow_mut();
        let exclude_edges = !range.is_empty();
        let start = point_index_in(&ranges, range.start, exclude_edges, 0).unwrap_or_else(|i| i);
        let end = match point_index_in(&ranges, range.end, exclude_edges, start) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        let end = end.max(start).min(ranges.len());
        ranges.splice(start..end, [range]).collect()
    }

    /// Add every range of `list`, returning all that were displaced.
    pub fn add_list(&mut self, list: &[Range]) -> Vec<Range> {
        list.iter().flat_map(|range| self.add(*range)).collect()
    }

    /// Remove the range containing `pos`, if any.
    pub fn subtract_point(&mut self, pos: Position) -> Option<Range> {
        let index = self.point_index(pos, false, 0).ok()?;
        Some(self.shared.ranges.borrow_mut().remove(index))
    }

    /// Sort and merge overlapping ranges, returning the ones absorbed.
    ///
    /// Ranges that merely touch stay separate unless one of them is empty.
    pub fn merge(&mut self) -> Vec<Range> {
        let mut ranges = self.shared.ranges.borrow_mut();
        merge_sorted(&mut ranges)
    }

    #[must_use]
    pub fn contains(&self, row: usize, column: usize) -> bool {
        self.contains_point(Position::new(row, column))
    }

    #[must_use]
    pub fn contains_point(&self, pos: Position) -> bool {
        self.point_index(pos, false, 0).is_ok()
    }

    #[must_use]
    pub fn range_at_point(&self, pos: Position) -> Option<Range> {
        let index = self.point_index(pos, false, 0).ok()?;
        self.shared.ranges.borrow().get(index).copied()
    }

    /// Ranges sharing at least one row with `first_row..=last_row`.
    #[must_use]
    pub fn clip_rows(&self, first_row: usize, last_row: usize) -> Vec<Range> {
        self.shared
            .ranges
            .borrow()
            .iter()
            .filter(|range| range.end.row >= first_row && range.start.row <= last_row)
            .copied()
            .collect()
    }

    /// Remove and return every range.
    pub fn remove_all(&mut self) -> Vec<Range> {
        std::mem::take(&mut *self.shared.ranges.borrow_mut())
    }

    /// Follow edits of `doc`.
    pub fn attach(&mut self, doc: &Document) {
        if self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.is_on(doc.changes()))
        {
            return;
        }
        let weak = Rc::downgrade(&self.shared);
        let id = doc.changes().on_while(move |delta| {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            shared.on_delta(delta);
            true
        });
        self.subscription = Some(Subscription::new(doc.changes(), id));
    }

    pub fn detach(&mut self) {
        self.subscription = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_live)
    }
}

impl Default for RangeList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeList")
            .field("ranges", &&*self.ranges())
            .field("policy", &self.policy())
            .field("attached", &self.is_attached())
            .finish()
    }
}

fn point_index_in(
    ranges: &[Range],
    pos: Position,
    exclude_edges: bool,
    start_index: usize,
) -> Result<usize, usize> {
    for (i, range) in ranges.iter().enumerate().skip(start_index) {
        let cmp_end = pos.cmp(&range.end);
        if cmp_end == Ordering::Greater {
            continue;
        }
        let cmp_start = pos.cmp(&range.start);
        if cmp_end == Ordering::Equal {
            return if exclude_edges && cmp_start != Ordering::Equal {
                Err(i + 1)
            } else {
                Ok(i)
            };
        }
        if cmp_start == Ordering::Greater || (cmp_start == Ordering::Equal && !exclude_edges) {
            return Ok(i);
        }
        return Err(i);
    }
    Err(ranges.len().max(start_index))
}

fn merge_sorted(ranges: &mut Vec<Range>) -> Vec<Range> {
    ranges.sort_by(|a, b| a.start.cmp(&b.start));
    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    let mut removed = Vec::new();
    for next in ranges.drain(..) {
        if let Some(range) = merged.last_mut() {
            let separate = match range.end.cmp(&next.start) {
                Ordering::Less => true,
                Ordering::Equal => !range.is_empty() && !next.is_empty(),
                Ordering::Greater => false,
            };
            if !separate {
                if range.end < next.end {
                    range.end = next.end;
                }
                removed.push(next);
                continue;
            }
        }
        merged.push(next);
    }
    *ranges = merged;
    removed
}
