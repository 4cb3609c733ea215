//! Undo/redo over recorded delta groups.
//!
//! Each undo step is a list of delta batches. A step normally holds one
//! batch; merging appends the next batch to the previous step so several
//! recorded edits undo together. A batch may also carry the folds its edits
//! removed, which undo puts back.

use tracing::debug;

use crate::fold::Fold;
use crate::text::{Delta, Document, Range, RangeRelation};

/// Anything that can replay deltas: a bare [`Document`] or an edit session
/// that keeps its own observers in step.
pub trait UndoTarget {
    /// Apply the inverse of `deltas`, last first.
    fn revert_deltas(&mut self, deltas: &[Delta]);

    /// Apply `deltas` in order.
    fn apply_deltas(&mut self, deltas: &[Delta]);

    /// Re-register folds removed by an edit that was just reverted.
    fn restore_folds(&mut self, _folds: &[Fold]) {}
}

impl UndoTarget for Document {
    fn revert_deltas(&mut self, deltas: &[Delta]) {
        Document::revert_deltas(self, deltas);
    }

    fn apply_deltas(&mut self, deltas: &[Delta]) {
        Document::apply_deltas(self, deltas);
    }
}

const DEFAULT_MAX_DEPTH: usize = 1000;

#[derive(Clone, Debug)]
struct Batch {
    deltas: Vec<Delta>,
    // Each fold is tagged with the index of the delta that removed it.
    folds: Vec<(usize, Fold)>,
}

impl Batch {
    fn revert<T: UndoTarget + ?Sized>(&self, target: &mut T) {
        let mut end = self.deltas.len();
        for (at, fold) in self.folds.iter().rev() {
            let at = (*at).min(end);
            if at < end {
                target.revert_deltas(&self.deltas[at..end]);
                end = at;
            }
            target.restore_folds(std::slice::from_ref(fold));
        }
        if end > 0 {
            target.revert_deltas(&self.deltas[..end]);
        }
    }
}

/// Undo and redo stacks with a clean-state marker.
#[derive(Clone, Debug)]
pub struct UndoManager {
    undo_stack: Vec<Vec<Batch>>,
    redo_stack: Vec<Vec<Batch>>,
    // Steps away from the clean state; `None` once the clean state can no
    // longer be reached.
    dirty: Option<isize>,
    max_depth: usize,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Keep at most `max_depth` undo steps, dropping the oldest.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            dirty: Some(0),
            max_depth: max_depth.max(1),
        }
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Oldest steps beyond the new depth are dropped.
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth.max(1);
        self.trim();
    }

    fn trim(&mut self) {
        if self.undo_stack.len() > self.max_depth {
            let excess = self.undo_stack.len() - self.max_depth;
            self.undo_stack.drain(..excess);
        }
    }

    /// Record `deltas` as a new undo step, or append them to the last step
    /// when `merge` is set. Clears the redo stack.
    pub fn execute(&mut self, deltas: Vec<Delta>, merge: bool) {
        self.execute_with_folds(deltas, Vec::new(), merge);
    }

    /// Like [`execute`](Self::execute), also recording folds the edits
    /// removed. Each fold is paired with the index in `deltas` of the delta
    /// that removed it; undo restores it once that delta is reverted.
    pub fn execute_with_folds(&mut self, deltas: Vec<Delta>, folds: Vec<(usize, Fold)>, merge: bool) {
        let batch = Batch { deltas, folds };
        let step = match self.undo_stack.pop() {
            Some(mut last) if merge => {
                self.dirty = self.dirty.map(|dirty| dirty - 1);
                last.push(batch);
                last
            }
            popped => {
                self.undo_stack.extend(popped);
                vec![batch]
            }
        };
        self.undo_stack.push(step);
        self.trim();
        self.redo_stack.clear();

        // An edit after undoing past the clean state makes it unreachable.
        if self.dirty.is_some_and(|dirty| dirty < 0) {
            self.dirty = None;
        }
        self.dirty = self.dirty.map(|dirty| dirty + 1);
    }

    /// Revert the last step through `target`.
    ///
    /// Returns the range to select afterwards, or `None` when there is
    /// nothing to undo.
    pub fn undo<T: UndoTarget + ?Sized>(&mut self, target: &mut T) -> Option<Range> {
        let step = self.undo_stack.pop()?;
        let mut selection = None;
        for batch in step.iter().rev().filter(|batch| !batch.deltas.is_empty()) {
            batch.revert(target);
            selection = Some(undo_selection(&batch.deltas, true, selection));
        }
        debug!(batches = step.len(), "undo");
        self.redo_stack.push(step);
        self.dirty = self.dirty.map(|dirty| dirty - 1);
        selection
    }

    /// Re-apply the last undone step through `target`.
    pub fn redo<T: UndoTarget + ?Sized>(&mut self, target: &mut T) -> Option<Range> {
        let step = self.redo_stack.pop()?;
        let mut selection = None;
        for batch in step.iter().filter(|batch| !batch.deltas.is_empty()) {
            target.apply_deltas(&batch.deltas);
            selection = Some(undo_selection(&batch.deltas, false, selection));
        }
        debug!(batches = step.len(), "redo");
        self.undo_stack.push(step);
        self.dirty = self.dirty.map(|dirty| dirty + 1);
        selection
    }

    /// Drop all history and mark the current state clean.
    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.mark_clean();
    }

    #[must_use]
    pub fn has_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn has_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn mark_clean(&mut self) {
        self.dirty = Some(0);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty == Some(0)
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}

/// Range to select after replaying `deltas`.
///
/// Covers the text the replay inserted, or collapses to where it removed
/// text. `last` is the selection of a batch replayed just before and is
/// folded into the result.
#[must_use]
pub fn undo_selection(deltas: &[Delta], is_undo: bool, last: Option<Range>) -> Range {
    let inserts = |delta: &Delta| delta.action().is_insert() != is_undo;
    let Some((first, rest)) = deltas.split_first() else {
        return last.unwrap_or_default();
    };

    let mut range = if inserts(first) {
        *first.range()
    } else {
        Range::at(first.range().start)
    };
    for delta in rest {
        let Range { start, end } = *delta.range();
        if inserts(delta) {
            if range.compare_point(start).is_lt() {
                range.start = start;
            }
            if range.compare_point(end).is_gt() {
                range.end = end;
            }
        } else if range.compare_point(start).is_lt() {
            range = Range::at(start);
        }
    }

    if let Some(mut last) = last {
        if last.start == range.start {
            let width = range.end.column as isize - range.start.column as isize;
            last.start.column = last.start.column.saturating_add_signed(width);
            last.end.column = last.end.column.saturating_add_signed(width);
        }
        match last.compare_range(&range) {
            RangeRelation::EndsAfter => range.start = last.start,
            RangeRelation::StartsBefore => range.end = last.end,
            _ => {}
        }
    }
    range
}
