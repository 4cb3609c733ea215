//! Runs of folds that collapse into one display row.

use std::cmp::Ordering;
use std::fmt;
use std::ops::ControlFlow;

use tracing::warn;

use super::fold::Fold;
use crate::error::{Error, Result};
use crate::text::{Position, Range};

/// Handle of a [`FoldLine`] inside its fold model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FoldLineId(pub(crate) u64);

/// Where a point lies relative to the nearest fold at or after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldPlacement {
    /// The fold starts after the point.
    After,
    /// The point lies inside the fold.
    Inside,
}

/// One piece produced by [`FoldLine::walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldSegment<'a> {
    /// Unfolded text on `row` from `start_column` up to `end_column`.
    /// `new_row` is set when the text does not continue a previous fold's
    /// last row.
    Text {
        row: usize,
        start_column: usize,
        end_column: usize,
        new_row: bool,
    },
    /// A fold placeholder; `row` and `column` are the fold start.
    Placeholder {
        placeholder: &'a str,
        row: usize,
        column: usize,
        last_column: usize,
    },
}

/// Folds whose rows connect into one display line.
///
/// Consecutive folds either share a row or the next fold starts on the row
/// where the previous one ends, so the whole line renders as one row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldLine {
    id: FoldLineId,
    folds: Vec<Fold>,
    range: Range,
}

impl FoldLine {
    pub(crate) fn new(id: FoldLineId, fold: Fold) -> Self {
        Self::from_folds(id, vec![fold])
    }

    pub(crate) fn from_folds(id: FoldLineId, folds: Vec<Fold>) -> Self {
        let mut line = Self {
            id,
            folds,
            range: Range::default(),
        };
        for fold in &mut line.folds {
            fold.set_fold_line(Some(id));
        }
        line.update_range();
        line
    }

    #[must_use]
    pub fn id(&self) -> FoldLineId {
        self.id
    }

    #[must_use]
    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// Span from the first fold's start to the last fold's end.
    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn start_row(&self) -> usize {
        self.range.start.row
    }

    #[must_use]
    pub fn end_row(&self) -> usize {
        self.range.end.row
    }

    #[must_use]
    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.range.start.row && row <= self.range.end.row
    }

    /// Move every fold by `shift` rows.
    pub fn shift_row(&mut self, shift: isize) {
        for fold in &mut self.folds {
            let range = fold.range_mut();
            range.start.row = range.start.row.saturating_add_signed(shift);
            range.end.row = range.end.row.saturating_add_signed(shift);
        }
        self.update_range();
    }

    /// Add a fold that connects to this line.
    ///
    /// Single-row folds must lie within the line's rows; multi-row folds must
    /// start on its last row or end on its first row.
    pub fn add_fold(&mut self, mut fold: Fold) -> Result<()> {
        if fold.is_same_row() {
            if !self.contains_row(fold.start().row) {
                return Err(Error::DisconnectedFold {
                    fold: fold.range(),
                    line: self.range,
                });
            }
            fold.set_fold_line(Some(self.id));
            self.folds.push(fold);
            self.folds.sort_by(|a, b| a.start().cmp(&b.start()));
        } else if fold.start().row == self.range.end.row {
            fold.set_fold_line(Some(self.id));
            self.folds.push(fold);
        } else if fold.end().row == self.range.start.row {
            fold.set_fold_line(Some(self.id));
            self.folds.insert(0, fold);
        } else {
            return Err(Error::DisconnectedFold {
                fold: fold.range(),
                line: self.range,
            });
        }
        self.update_range();
        Ok(())
    }

    /// Visit the line as alternating text and placeholder segments, up to
    /// `end` (the line's end by default).
    pub fn walk<F>(&self, mut callback: F, end: Option<Position>)
    where
        F: FnMut(FoldSegment<'_>) -> ControlFlow<()>,
    {
        let end = end.unwrap_or(self.range.end);
        let mut last_end = 0;
        let mut new_row = true;

        for fold in &self.folds {
            let cmp = fold.range().compare_start(end.row, end.column);
            if cmp == Ordering::Less {
                let _ = callback(FoldSegment::Text {
                    row: end.row,
                    start_column: last_end,
                    end_column: end.column,
                    new_row,
                });
                return;
            }

            let start = fold.start();
            let text = FoldSegment::Text {
                row: start.row,
                start_column: last_end,
                end_column: start.column,
                new_row,
            };
            if callback(text).is_break() {
                return;
            }
            let placeholder = FoldSegment::Placeholder {
                placeholder: fold.placeholder(),
                row: start.row,
                column: start.column,
                last_column: last_end,
            };
            if callback(placeholder).is_break() || cmp == Ordering::Equal {
                return;
            }

            new_row = !fold.is_same_row();
            last_end = fold.end().column;
        }

        let _ = callback(FoldSegment::Text {
            row: end.row,
            start_column: last_end,
            end_column: end.column,
            new_row,
        });
    }

    /// First fold that contains `(row, column)` or starts after it.
    #[must_use]
    pub fn next_fold_to(&self, row: usize, column: usize) -> Option<(usize, FoldPlacement)> {
        self.folds
            .iter()
            .enumerate()
            .find_map(|(i, fold)| match fold.range().compare_end(row, column) {
                Ordering::Less => Some((i, FoldPlacement::After)),
                Ordering::Equal => Some((i, FoldPlacement::Inside)),
                Ordering::Greater => None,
            })
    }

    /// Shift the columns of folds on `row` at or after `column` by `len`.
    ///
    /// Shifting stops at the first multi-row fold, whose end lies on a later
    /// row and is unaffected.
    pub fn add_remove_chars(&mut self, row: usize, column: usize, len: isize) {
        let Some((index, placement)) = self.next_fold_to(row, column) else {
            return;
        };
        let fold = &self.folds[index];
        if placement == FoldPlacement::Inside
            && fold.start().column != column
            && fold.start().row != row
        {
            warn!(row, column, fold = %fold, "edit inside a fold left it unchanged");
            return;
        }
        if fold.start().row != row {
            return;
        }
        for fold in &mut self.folds[index..] {
            let range = fold.range_mut();
            range.start.column = range.start.column.saturating_add_signed(len);
            if range.is_multi_line() {
                break;
            }
            range.end.column = range.end.column.saturating_add_signed(len);
        }
        self.update_range();
    }

    /// Split before the first fold at or after `(row, column)`.
    ///
    /// A point on a fold's start splits before that fold. Returns the folds
    /// from that point on as a new line with `id`, or `None` when the point
    /// is inside a fold or at or before the start of the first one.
    pub(crate) fn split(&mut self, row: usize, column: usize, id: FoldLineId) -> Option<FoldLine> {
        let (index, placement) = self.next_fold_to(row, column)?;
        let at_start = self.folds[index].range().is_start(row, column);
        if index == 0 || (placement == FoldPlacement::Inside && !at_start) {
            return None;
        }
        let tail = self.folds.split_off(index);
        self.update_range();
        Some(FoldLine::from_folds(id, tail))
    }

    /// Append the folds of the following line.
    pub(crate) fn merge(&mut self, next: FoldLine) {
        for mut fold in next.folds {
            fold.set_fold_line(Some(self.id));
            self.folds.push(fold);
        }
        self.folds.sort_by(|a, b| a.start().cmp(&b.start()));
        self.update_range();
    }

    /// Map a character index in the rendered line back to a document
    /// position. Indices inside a placeholder map to the fold start.
    #[must_use]
    pub fn idx_to_position(&self, idx: usize) -> Position {
        let mut idx = idx as isize;
        let mut last_end = 0isize;
        for fold in &self.folds {
            let start = fold.start();
            idx -= start.column as isize - last_end;
            if idx < 0 {
                return Position::new(start.row, (start.column as isize + idx).max(0) as usize);
            }
            idx -= fold.placeholder().chars().count() as isize;
            if idx < 0 {
                return start;
            }
            last_end = fold.end().column as isize;
        }
        Position::new(
            self.range.end.row,
            self.range.end.column.saturating_add_signed(idx),
        )
    }

    pub(crate) fn folds_mut(&mut self) -> &mut Vec<Fold> {
        &mut self.folds
    }

    pub(crate) fn update_range(&mut self) {
        if let (Some(first), Some(last)) = (self.folds.first(), self.folds.last()) {
            self.range = Range::from_points(first.start(), last.end());
        }
    }
}

impl fmt::Display for FoldLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FoldLine({}) {}", self.folds.len(), self.range)
    }
}
