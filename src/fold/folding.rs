//! Fold registry for a document and its edit tracking.

use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::fold::Fold;
use super::fold_line::{FoldLine, FoldLineId, FoldSegment};
use crate::error::{Error, Result};
use crate::event::{Emitter, ListenerId, Subscription};
use crate::text::{Delta, Document, Position, Range, RangeRelation, byte_offset, char_len};

/// Which folds [`FoldModel::fold_at`] accepts at their edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FoldSide {
    /// Both edges count.
    #[default]
    Any,
    /// The fold must extend to the right of the point, so a fold ending
    /// there is skipped.
    Right,
    /// The fold must extend to the left of the point, so a fold starting
    /// there is skipped.
    Left,
}

/// Fold add/remove notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FoldChange {
    Added(Fold),
    Removed(Fold),
}

#[derive(Default)]
struct FoldData {
    lines: Vec<FoldLine>,
    next_id: u64,
}

impl FoldData {
    fn alloc_id(&mut self) -> FoldLineId {
        self.next_id += 1;
        FoldLineId(self.next_id)
    }

    fn line_index(&self, row: usize) -> Option<usize> {
        for (i, line) in self.lines.iter().enumerate() {
            if line.contains_row(row) {
                return Some(i);
            }
            if line.end_row() > row {
                return None;
            }
        }
        None
    }

    fn next_line_index(&self, row: usize) -> Option<usize> {
        self.lines.iter().position(|line| line.end_row() >= row)
    }

    fn fold_at(&self, row: usize, column: usize, side: FoldSide) -> Option<&Fold> {
        let line = &self.lines[self.line_index(row)?];
        line.folds().iter().find(|fold| {
            let range = fold.range();
            range.contains(row, column)
                && !(side == FoldSide::Right && range.is_end(row, column))
                && !(side == FoldSide::Left && range.is_start(row, column))
        })
    }

    // Folds overlapping the interior of `range`; folds that only touch it
    // are left out.
    fn folds_in_range(&self, range: Range) -> Vec<Fold> {
        let Some(query) = shrink(range) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for line in &self.lines {
            match line.range().compare_range(&query) {
                RangeRelation::After => continue,
                RangeRelation::Before => break,
                _ => {}
            }
            for fold in line.folds() {
                match fold.range().compare_range(&query) {
                    RangeRelation::Before | RangeRelation::Degenerate => break,
                    RangeRelation::After => continue,
                    _ => found.push(fold.clone()),
                }
            }
        }
        found
    }

    fn locate(&self, range: Range) -> Option<(usize, usize)> {
        self.lines.iter().enumerate().find_map(|(i, line)| {
            line.folds()
                .iter()
                .position(|fold| fold.range() == range)
                .map(|j| (i, j))
        })
    }

    fn remove_fold(&mut self, range: Range) -> Option<Fold> {
        let (li, fi) = self.locate(range)?;
        let count = self.lines[li].folds().len();
        if count == 1 {
            let mut line = self.lines.remove(li);
            return line.folds_mut().pop();
        }

        let same_row = self.lines[li].folds()[fi].is_same_row();
        if fi == 0 || fi == count - 1 || same_row {
            let line = &mut self.lines[li];
            let removed = line.folds_mut().remove(fi);
            line.update_range();
            return Some(removed);
        }

        // A multi-row fold in the middle held the two halves together.
        let id = self.alloc_id();
        let line = &mut self.lines[li];
        let tail = line.folds_mut().split_off(fi + 1);
        let removed = line.folds_mut().pop();
        line.update_range();
        debug!(line = %line, "fold line split by fold removal");
        self.lines.insert(li + 1, FoldLine::from_folds(id, tail));
        removed
    }

    fn remove_in_range(&mut self, range: Range) -> Vec<Fold> {
        let folds = self.folds_in_range(range);
        folds
            .into_iter()
            .filter_map(|fold| self.remove_fold(fold.range()))
            .collect()
    }

    fn insert_fold(&mut self, fold: Fold) -> Result<(Fold, Vec<FoldChange>)> {
        let Range { start, end } = fold.range();
        if !(start.row < end.row || (start.row == end.row && start.column + 2 <= end.column)) {
            return Err(Error::FoldTooSmall {
                range: fold.range(),
            });
        }

        let start_fold = self.fold_at(start.row, start.column, FoldSide::Right).map(Fold::range);
        let end_fold = self.fold_at(end.row, end.column, FoldSide::Left).map(Fold::range);
        if let (Some(outer), Some(other)) = (start_fold, end_fold) {
            if outer == other {
                if let Some((li, fi)) = self.locate(outer) {
                    self.lines[li].folds_mut()[fi].add_sub_fold(fold.clone())?;
                    debug!(fold = %fold, parent = %outer, "nested fold");
                }
                return Ok((fold, Vec::new()));
            }
        }
        if let Some(existing) = start_fold.filter(|r| !r.is_start(start.row, start.column)) {
            return Err(Error::FoldOverlap {
                fold: fold.range(),
                existing,
            });
        }
        if let Some(existing) = end_fold.filter(|r| !r.is_end(end.row, end.column)) {
            return Err(Error::FoldOverlap {
                fold: fold.range(),
                existing,
            });
        }

        let inner = self.folds_in_range(fold.range());
        let mut fold = fold;
        let mut changes = Vec::new();
        if !inner.is_empty() {
            let mut candidate = fold.clone();
            for sub in &inner {
                candidate.add_sub_fold(sub.clone())?;
            }
            for sub in &inner {
                if let Some(removed) = self.remove_fold(sub.range()) {
                    changes.push(FoldChange::Removed(removed));
                }
            }
            fold = candidate;
        }

        let mut target = None;
        for i in 0..self.lines.len() {
            let (line_start, line_end) = (self.lines[i].start_row(), self.lines[i].end_row());
            if end.row == line_start {
                self.lines[i].add_fold(fold.clone())?;
                target = Some(i);
                break;
            }
            if start.row == line_end {
                self.lines[i].add_fold(fold.clone())?;
                target = Some(i);
                if !fold.is_same_row()
                    && self.lines.get(i + 1).is_some_and(|next| next.start_row() == end.row)
                {
                    let next = self.lines.remove(i + 1);
                    self.lines[i].merge(next);
                    debug!(line = %self.lines[i], "fold lines merged");
                }
                break;
            }
            if end.row <= line_start {
                break;
            }
        }

        let id = match target {
            Some(i) => self.lines[i].id(),
            None => {
                let id = self.alloc_id();
                let at = self.lines.partition_point(|line| line.start_row() <= start.row);
                self.lines.insert(at, FoldLine::new(id, fold.clone()));
                id
            }
        };
        fold.set_fold_line(Some(id));
        debug!(fold = %fold, "fold added");
        changes.push(FoldChange::Added(fold.clone()));
        Ok((fold, changes))
    }

    fn apply_delta(&mut self, delta: &Delta) -> Vec<Fold> {
        let range = *delta.range();
        let Range { start, end } = range;
        let first_row = start.row;
        let action = delta.action();
        let len = delta.lines().map_or(end.row - start.row, <[String]>::len);
        let mut removed = Vec::new();

        if action.is_insert() {
            // Text typed into a hidden region invalidates the fold around it.
            let broken = self
                .fold_at(start.row, start.column, FoldSide::Any)
                .filter(|fold| fold.range().inside(start.row, start.column))
                .map(Fold::range);
            if let Some(broken) = broken {
                warn!(fold = %broken, "insert inside a fold, removing it");
                removed.extend(self.remove_fold(broken));
            }
        }

        if len == 0 {
            let width = end.column.abs_diff(start.column) as isize;
            let shift = if action.is_remove() {
                removed.extend(self.remove_in_range(range));
                -width
            } else {
                width
            };
            if let Some(idx) = self.line_index(first_row) {
                self.lines[idx].add_remove_chars(first_row, start.column, shift);
            }
            return removed;
        }

        let rows = len as isize;
        let column_shift = end.column as isize - start.column as isize;
        if action.is_remove() {
            removed.extend(self.remove_in_range(range));
            let mut next = 0;
            if let Some(mut idx) = self.line_index(end.row) {
                let line = &mut self.lines[idx];
                line.add_remove_chars(end.row, end.column, -column_shift);
                line.shift_row(-rows);
                if let Some(before) = self.line_index(first_row) {
                    if before != idx {
                        let line = self.lines.remove(idx);
                        self.lines[before].merge(line);
                        debug!(line = %self.lines[before], "fold lines joined by removal");
                        idx = before;
                    }
                }
                next = idx + 1;
            }
            for line in &mut self.lines[next..] {
                if line.start_row() >= end.row {
                    line.shift_row(-rows);
                }
            }
        } else {
            let last_row = match delta {
                Delta::InsertLines { .. } => first_row + len,
                _ => end.row,
            };
            let mut next = 0;
            if let Some(mut idx) = self.line_index(first_row) {
                match self.lines[idx].range().compare_inside(start.row, start.column) {
                    Ordering::Equal => {
                        let id = self.alloc_id();
                        if let Some(mut tail) = self.lines[idx].split(start.row, start.column, id) {
                            tail.shift_row(rows);
                            tail.add_remove_chars(last_row, 0, column_shift);
                            debug!(line = %tail, "fold line split by insert");
                            self.lines.insert(idx + 1, tail);
                            idx += 1;
                        } else {
                            warn!(row = start.row, column = start.column, "fold line could not be split");
                        }
                    }
                    Ordering::Less => {
                        let line = &mut self.lines[idx];
                        line.add_remove_chars(first_row, 0, column_shift);
                        line.shift_row(rows);
                    }
                    Ordering::Greater => {}
                }
                next = idx + 1;
            }
            for line in &mut self.lines[next..] {
                if line.start_row() >= first_row {
                    line.shift_row(rows);
                }
            }
        }
        removed
    }
}

// Pull both ends one column inward so folds that merely touch the range are
// not reported. A range ending at column 0 ends just after the previous row.
fn shrink(range: Range) -> Option<Range> {
    let start = Position::new(range.start.row, range.start.column + 1);
    let end = if range.end.column > 0 {
        Position::new(range.end.row, range.end.column - 1)
    } else if range.end.row > 0 {
        Position::new(range.end.row - 1, usize::MAX)
    } else {
        return None;
    };
    Some(Range::from_points(start, end))
}

fn char_slice(line: &str, from: usize, to: usize) -> &str {
    if from >= to {
        return "";
    }
    &line[byte_offset(line, from)..byte_offset(line, to)]
}

struct FoldShared {
    data: RefCell<FoldData>,
    changes: Emitter<FoldChange>,
}

impl FoldShared {
    fn emit_all(&self, changes: Vec<FoldChange>) {
        for change in &changes {
            self.changes.emit(change);
        }
    }

    fn on_delta(&self, delta: &Delta) {
        let removed = self.data.borrow_mut().apply_delta(delta);
        if !removed.is_empty() {
            trace!(count = removed.len(), "folds removed by edit");
        }
        self.emit_all(removed.into_iter().map(FoldChange::Removed).collect());
    }
}

/// All folds of one document, grouped into [`FoldLine`]s.
///
/// Once attached, the model follows every document delta: folds caught in a
/// removal are dropped, fold lines below an edit shift, and edits that cut
/// through or join fold lines split or merge them.
pub struct FoldModel {
    shared: Rc<FoldShared>,
    subscription: Option<Subscription<Delta>>,
}

impl FoldModel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(FoldShared {
                data: RefCell::new(FoldData::default()),
                changes: Emitter::new(),
            }),
            subscription: None,
        }
    }

    /// Follow the edits of `doc`.
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

    /// Listen for folds being added or removed.
    pub fn on_fold_change<F>(&self, handler: F) -> ListenerId
    where
        F: FnMut(&FoldChange) + 'static,
    {
        self.shared.changes.on(handler)
    }

    pub fn off_fold_change(&self, id: ListenerId) -> bool {
        self.shared.changes.off(id)
    }

    /// Fold `range`, clipped to `doc`, behind `placeholder`.
    pub fn add_fold(&self, doc: &Document, placeholder: &str, range: Range) -> Result<Fold> {
        self.insert_fold(doc, Fold::new(range, placeholder))
    }

    /// Register a prepared fold, keeping its sub-folds.
    ///
    /// A fold inside an existing fold is nested into it. Existing folds
    /// inside the new one become its sub-folds.
    pub fn insert_fold(&self, doc: &Document, mut fold: Fold) -> Result<Fold> {
        let range = fold.range();
        *fold.range_mut() = Range::from_points(
            doc.clip_position(range.start),
            doc.clip_position(range.end),
        );
        let (fold, changes) = self.shared.data.borrow_mut().insert_fold(fold)?;
        self.shared.emit_all(changes);
        Ok(fold)
    }

    pub fn add_folds(&self, doc: &Document, folds: Vec<Fold>) -> Result<()> {
        for fold in folds {
            self.insert_fold(doc, fold)?;
        }
        Ok(())
    }

    /// Remove a top-level fold. Returns `false` if no fold has its range.
    pub fn remove_fold(&self, fold: &Fold) -> bool {
        let removed = self.shared.data.borrow_mut().remove_fold(fold.range());
        match removed {
            Some(removed) => {
                debug!(fold = %removed, "fold removed");
                self.shared.changes.emit(&FoldChange::Removed(removed));
                true
            }
            None => false,
        }
    }

    pub fn remove_folds(&self, folds: &[Fold]) {
        for fold in folds {
            self.remove_fold(fold);
        }
    }

    /// Remove `fold` and register its sub-folds in its place.
    pub fn expand_fold(&self, doc: &Document, fold: &Fold) -> Result<()> {
        let removed = self.shared.data.borrow_mut().remove_fold(fold.range());
        let Some(mut removed) = removed else {
            return Ok(());
        };
        let subs = removed.take_sub_folds();
        self.shared.changes.emit(&FoldChange::Removed(removed));
        for sub in subs {
            self.insert_fold(doc, sub)?;
        }
        Ok(())
    }

    pub fn expand_folds(&self, doc: &Document, folds: &[Fold]) -> Result<()> {
        for fold in folds {
            self.expand_fold(doc, fold)?;
        }
        Ok(())
    }

    /// Open the folds in `range` (the whole document when `None`).
    ///
    /// With `expand_inner` (implied for the whole document) nested folds go
    /// too; otherwise folds are expanded level by level until none is left
    /// in the range. Returns the top-level folds that were opened.
    pub fn unfold(&self, doc: &Document, range: Option<Range>, expand_inner: bool) -> Vec<Fold> {
        let (range, expand_inner) = match range {
            Some(range) => (range, expand_inner),
            None => (Range::new(0, 0, doc.len(), 0), true),
        };
        let folds = self.folds_in_range(range);
        if expand_inner {
            self.remove_folds(&folds);
        } else {
            let mut level = folds.clone();
            while !level.is_empty() {
                if let Err(err) = self.expand_folds(doc, &level) {
                    warn!(%err, "sub-fold could not be restored");
                }
                let next = self.folds_in_range(range);
                if next == level {
                    break;
                }
                level = next;
            }
        }
        folds
    }

    /// Open the folds on `row`.
    pub fn unfold_row(&self, doc: &Document, row: usize) -> Vec<Fold> {
        self.unfold(doc, Some(Range::new(row, 0, row, doc.line_len(row))), false)
    }

    /// Fold containing `(row, column)`.
    #[must_use]
    pub fn fold_at(&self, row: usize, column: usize, side: FoldSide) -> Option<Fold> {
        self.shared.data.borrow().fold_at(row, column, side).cloned()
    }

    /// Top-level folds overlapping `range`, excluding folds that only touch
    /// its edges.
    #[must_use]
    pub fn folds_in_range(&self, range: Range) -> Vec<Fold> {
        self.shared.data.borrow().folds_in_range(range)
    }

    #[must_use]
    pub fn folds_in_range_list(&self, ranges: &[Range]) -> Vec<Fold> {
        let data = self.shared.data.borrow();
        ranges
            .iter()
            .flat_map(|range| data.folds_in_range(*range))
            .collect()
    }

    #[must_use]
    pub fn all_folds(&self) -> Vec<Fold> {
        self.shared
            .data
            .borrow()
            .lines
            .iter()
            .flat_map(|line| line.folds().iter().cloned())
            .collect()
    }

    /// Fold lines ordered by row. Release the borrow before editing.
    #[must_use]
    pub fn fold_lines(&self) -> Ref<'_, [FoldLine]> {
        Ref::map(self.shared.data.borrow(), |data| data.lines.as_slice())
    }

    /// Fold line covering `row`.
    #[must_use]
    pub fn fold_line(&self, row: usize) -> Option<Ref<'_, FoldLine>> {
        Ref::filter_map(self.shared.data.borrow(), |data| {
            data.line_index(row).map(|i| &data.lines[i])
        })
        .ok()
    }

    /// First fold line ending at or after `row`.
    #[must_use]
    pub fn next_fold_line(&self, row: usize) -> Option<Ref<'_, FoldLine>> {
        Ref::filter_map(self.shared.data.borrow(), |data| {
            data.next_line_index(row).map(|i| &data.lines[i])
        })
        .ok()
    }

    #[must_use]
    pub fn is_row_folded(&self, row: usize) -> bool {
        self.shared.data.borrow().line_index(row).is_some()
    }

    /// Last row of the fold line covering `row`, or `row` itself.
    #[must_use]
    pub fn row_fold_end(&self, row: usize) -> usize {
        self.fold_line(row).map_or(row, |line| line.end_row())
    }

    /// First row of the fold line covering `row`, or `row` itself.
    #[must_use]
    pub fn row_fold_start(&self, row: usize) -> usize {
        self.fold_line(row).map_or(row, |line| line.start_row())
    }

    /// Number of display rows that `first..=last` occupies.
    #[must_use]
    pub fn folded_row_count(&self, first: usize, last: usize) -> usize {
        let data = self.shared.data.borrow();
        let mut count = last as isize - first as isize + 1;
        for line in &data.lines {
            let (start, end) = (line.start_row() as isize, line.end_row() as isize);
            let (first, last) = (first as isize, last as isize);
            if end >= last {
                if start < last {
                    if start >= first {
                        count -= last - start;
                    } else {
                        count = 0;
                    }
                }
                break;
            } else if end >= first {
                if start >= first {
                    count -= end - start;
                } else {
                    count -= end - first + 1;
                }
            }
        }
        count.max(0) as usize
    }

    /// Render a fold line as one row of text with placeholders, from
    /// `start` (the line start by default) up to `end` (the end of its last
    /// row by default).
    #[must_use]
    pub fn fold_display_line(
        &self,
        doc: &Document,
        line: &FoldLine,
        end: Option<Position>,
        start: Option<Position>,
    ) -> String {
        let end = end.unwrap_or_else(|| {
            let row = line.end_row();
            Position::new(row, doc.line_len(row))
        });
        let start = start.unwrap_or(Position::new(line.start_row(), 0));
        let mut text = String::new();
        line.walk(
            |segment| {
                match segment {
                    FoldSegment::Text {
                        row,
                        start_column,
                        end_column,
                        ..
                    } => {
                        if row < start.row || (row == start.row && end_column < start.column) {
                            return ControlFlow::Continue(());
                        }
                        let from = if row == start.row {
                            start_column.max(start.column)
                        } else {
                            start_column
                        };
                        text.push_str(char_slice(doc.line(row), from, end_column));
                    }
                    FoldSegment::Placeholder {
                        placeholder,
                        row,
                        column,
                        ..
                    } => {
                        if row < start.row || (row == start.row && column < start.column) {
                            return ControlFlow::Continue(());
                        }
                        text.push_str(placeholder);
                    }
                }
                ControlFlow::Continue(())
            },
            Some(end),
        );
        text
    }

    /// Text of display row `row`, with folds collapsed.
    #[must_use]
    pub fn display_line(
        &self,
        doc: &Document,
        row: usize,
        end_column: Option<usize>,
        start: Option<Position>,
    ) -> String {
        match self.fold_line(row) {
            Some(line) => {
                let end = end_column.map(|column| Position::new(row, column));
                self.fold_display_line(doc, &line, end, start)
            }
            None => {
                let text = doc.line(row);
                let from = start.map_or(0, |p| p.column);
                let to = end_column.unwrap_or_else(|| char_len(text));
                char_slice(text, from, to).to_string()
            }
        }
    }

    /// Number of top-level folds.
    #[must_use]
    pub fn fold_count(&self) -> usize {
        self.shared
            .data
            .borrow()
            .lines
            .iter()
            .map(|line| line.folds().len())
            .sum()
    }
}

impl Default for FoldModel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FoldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoldModel")
            .field("lines", &self.shared.data.borrow().lines.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
