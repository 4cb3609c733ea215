//! A collapsed region and its nested sub-folds.

use std::fmt;

use super::fold_line::FoldLineId;
use crate::error::{Error, Result};
use crate::text::{Position, Range};

/// A range of the document displayed as a placeholder.
///
/// Sub-folds are stored relative to this fold's start: rows count from the
/// fold's start row, and columns on that first row count from its start
/// column. [`restore_range`](Self::restore_range) maps them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fold {
    range: Range,
    placeholder: String,
    sub_folds: Vec<Fold>,
    fold_line: Option<FoldLineId>,
    collapse_children: usize,
}

impl Fold {
    #[must_use]
    pub fn new(range: Range, placeholder: impl Into<String>) -> Self {
        Self {
            range,
            placeholder: placeholder.into(),
            sub_folds: Vec::new(),
            fold_line: None,
            collapse_children: 0,
        }
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn start(&self) -> Position {
        self.range.start
    }

    #[must_use]
    pub fn end(&self) -> Position {
        self.range.end
    }

    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Nested folds, in this fold's local coordinates.
    #[must_use]
    pub fn sub_folds(&self) -> &[Fold] {
        &self.sub_folds
    }

    /// The fold line this fold belongs to, once registered.
    #[must_use]
    pub fn fold_line(&self) -> Option<FoldLineId> {
        self.fold_line
    }

    #[must_use]
    pub fn is_same_row(&self) -> bool {
        !self.range.is_multi_line()
    }

    #[must_use]
    pub fn collapse_children(&self) -> usize {
        self.collapse_children
    }

    /// Depth of nested folds to collapse again when this fold is expanded.
    pub fn set_collapse_children(&mut self, depth: usize) {
        self.collapse_children = depth;
    }

    #[must_use]
    pub fn with_collapse_children(mut self, depth: usize) -> Self {
        self.collapse_children = depth;
        self
    }

    /// Nest `fold`, given in document coordinates, inside this fold.
    ///
    /// Adding a fold equal to this one is a no-op. A fold that is not
    /// contained, or that partially overlaps an existing sub-fold, is
    /// rejected. Existing sub-folds that lie entirely inside `fold` become
    /// its children.
    pub fn add_sub_fold(&mut self, mut fold: Fold) -> Result<()> {
        if fold.range == self.range {
            return Ok(());
        }
        if !self.range.contains_range(&fold.range) {
            return Err(Error::FoldOverlap {
                fold: fold.range,
                existing: self.range,
            });
        }
        fold.range = consume_range(fold.range, self.range.start);
        self.insert_local(fold).map_err(|err| self.restore_error(err))
    }

    /// Map a range from this fold's local frame to document coordinates.
    #[must_use]
    pub fn restore_range(&self, range: Range) -> Range {
        Range::from_points(
            restore_point(range.start, self.range.start),
            restore_point(range.end, self.range.start),
        )
    }

    /// Sub-folds converted back to document coordinates.
    #[must_use]
    pub fn restored_sub_folds(&self) -> Vec<Fold> {
        self.sub_folds
            .iter()
            .map(|sub| {
                let mut sub = sub.clone();
                sub.range = self.restore_range(sub.range);
                sub
            })
            .collect()
    }

    pub(crate) fn take_sub_folds(&mut self) -> Vec<Fold> {
        let restored = self.restored_sub_folds();
        self.sub_folds.clear();
        restored
    }

    pub(crate) fn set_fold_line(&mut self, fold_line: Option<FoldLineId>) {
        self.fold_line = fold_line;
        for sub in &mut self.sub_folds {
            sub.set_fold_line(fold_line);
        }
    }

    pub(crate) fn range_mut(&mut self) -> &mut Range {
        &mut self.range
    }

    // Errors from `insert_local` carry local ranges.
    fn restore_error(&self, err: Error) -> Error {
        match err {
            Error::FoldOverlap { fold, existing } => Error::FoldOverlap {
                fold: self.restore_range(fold),
                existing: self.restore_range(existing),
            },
            other => other,
        }
    }

    // `fold` is already expressed in this fold's frame.
    fn insert_local(&mut self, mut fold: Fold) -> Result<()> {
        let Range { start, end } = fold.range;
        let i = self
            .sub_folds
            .iter()
            .position(|sibling| sibling.range.end > start)
            .unwrap_or(self.sub_folds.len());

        if let Some(sibling) = self.sub_folds.get_mut(i) {
            if sibling.range.contains_range(&fold.range) {
                return sibling.add_sub_fold(fold);
            }
            if sibling.range.start < start {
                return Err(Error::FoldOverlap {
                    fold: fold.range,
                    existing: sibling.range,
                });
            }
        }

        let mut j = i;
        while j < self.sub_folds.len() && self.sub_folds[j].range.end <= end {
            j += 1;
        }
        if let Some(sibling) = self.sub_folds.get(j) {
            if sibling.range.start < end {
                return Err(Error::FoldOverlap {
                    fold: fold.range,
                    existing: sibling.range,
                });
            }
        }

        // Validate the nesting on a copy so a failure leaves `self` untouched.
        let mut candidate = fold.clone();
        for consumed in &self.sub_folds[i..j] {
            let mut consumed = consumed.clone();
            consumed.range = consume_range(consumed.range, fold.range.start);
            candidate
                .insert_local(consumed)
                .map_err(|err| candidate.restore_error(err))?;
        }
        fold = candidate;
        self.sub_folds.drain(i..j);
        fold.set_fold_line(self.fold_line);
        self.sub_folds.insert(i, fold);
        Ok(())
    }
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.placeholder, self.range)
    }
}

fn consume_point(point: Position, anchor: Position) -> Position {
    let row = point.row - anchor.row;
    if row == 0 {
        Position::new(0, point.column - anchor.column)
    } else {
        Position::new(row, point.column)
    }
}

fn consume_range(range: Range, anchor: Position) -> Range {
    Range::from_points(consume_point(range.start, anchor), consume_point(range.end, anchor))
}

fn restore_point(point: Position, anchor: Position) -> Position {
    if point.row == 0 {
        Position::new(anchor.row, point.column + anchor.column)
    } else {
        Position::new(point.row + anchor.row, point.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(sr: usize, sc: usize, er: usize, ec: usize) -> Fold {
        Fold::new(Range::new(sr, sc, er, ec), "...")
    }

    #[test]
    fn test_add_sub_fold_rejects_partial_overlap() {
        let mut parent = fold(0, 0, 10, 0);
        let err = parent.add_sub_fold(fold(3, 0, 12, 0)).unwrap_err();
        assert_eq!(
            err,
            Error::FoldOverlap {
                fold: Range::new(3, 0, 12, 0),
                existing: Range::new(0, 0, 10, 0),
            }
        );
        assert!(parent.sub_folds().is_empty());
    }

    #[test]
    fn test_add_sub_fold_stores_local_coordinates() {
        let mut parent = fold(0, 0, 10, 0);
        parent.add_sub_fold(fold(3, 0, 5, 0)).expect("contained");
        assert_eq!(parent.sub_folds().len(), 1);
        assert_eq!(parent.sub_folds()[0].range(), Range::new(3, 0, 5, 0));

        let mut shifted = fold(2, 4, 8, 0);
        shifted.add_sub_fold(fold(2, 6, 3, 1)).expect("contained");
        assert_eq!(shifted.sub_folds()[0].range(), Range::new(0, 2, 1, 1));
        assert_eq!(
            shifted.restore_range(shifted.sub_folds()[0].range()),
            Range::new(2, 6, 3, 1)
        );
    }

    #[test]
    fn test_nested_overlap_reports_document_ranges() {
        let mut parent = fold(2, 4, 20, 0);
        parent.add_sub_fold(fold(5, 0, 8, 0)).unwrap();
        parent.add_sub_fold(fold(6, 0, 7, 2)).unwrap();

        let err = parent.add_sub_fold(fold(6, 1, 9, 0)).unwrap_err();
        assert_eq!(
            err,
            Error::FoldOverlap {
                fold: Range::new(6, 1, 9, 0),
                existing: Range::new(5, 0, 8, 0),
            }
        );

        // Rejected one level further down.
        let err = parent.add_sub_fold(fold(5, 3, 6, 1)).unwrap_err();
        assert_eq!(
            err,
            Error::FoldOverlap {
                fold: Range::new(5, 3, 6, 1),
                existing: Range::new(6, 0, 7, 2),
            }
        );
        assert_eq!(parent.sub_folds().len(), 1);
    }

    #[test]
    fn test_equal_fold_is_noop() {
        let mut parent = fold(1, 0, 4, 0);
        parent.add_sub_fold(fold(1, 0, 4, 0)).expect("equal is fine");
        assert!(parent.sub_folds().is_empty());
    }

    #[test]
    fn test_siblings_are_ordered_and_nested() {
        let mut parent = fold(0, 0, 20, 0);
        parent.add_sub_fold(fold(10, 0, 12, 0)).unwrap();
        parent.add_sub_fold(fold(2, 0, 4, 0)).unwrap();
        let starts: Vec<_> = parent.sub_folds().iter().map(|f| f.start().row).collect();
        assert_eq!(starts, [2, 10]);

        // Lands inside the existing (10..12) sibling.
        parent.add_sub_fold(fold(11, 0, 11, 5)).unwrap();
        assert_eq!(parent.sub_folds().len(), 2);
        assert_eq!(parent.sub_folds()[1].sub_folds()[0].range(), Range::new(1, 0, 1, 5));

        // Swallows both siblings.
        parent.add_sub_fold(fold(1, 0, 15, 0)).unwrap();
        assert_eq!(parent.sub_folds().len(), 1);
        let outer = &parent.sub_folds()[0];
        assert_eq!(outer.sub_folds().len(), 2);
        assert_eq!(outer.sub_folds()[0].range(), Range::new(1, 0, 3, 0));
    }

    #[test]
    fn test_overlapping_sibling_rejected() {
        let mut parent = fold(0, 0, 20, 0);
        parent.add_sub_fold(fold(5, 0, 8, 0)).unwrap();
        assert!(parent.add_sub_fold(fold(6, 0, 9, 0)).is_err());
        assert!(parent.add_sub_fold(fold(3, 0, 6, 0)).is_err());
        // Touching is allowed.
        parent.add_sub_fold(fold(8, 0, 9, 0)).unwrap();
        assert_eq!(parent.sub_folds().len(), 2);
    }

    #[test]
    fn test_display() {
        insta::assert_snapshot!(fold(1, 2, 3, 4).to_string(), @r#""..." Range: [1/2] -> [3/4]"#);
    }
}
