//! Start/end position pairs and their comparison algebra.

use std::cmp::Ordering;
use std::fmt;

use super::position::Position;

/// Where another range lies relative to a range, as returned by
/// [`Range::compare_range`].
///
/// The numeric codes (see [`code`](Self::code)) are part of the contract:
/// callers that sort or merge ranges match on them directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum RangeRelation {
    /// The other range ends before this one starts.
    Before = -2,
    /// The other range starts before this one and ends inside it.
    StartsBefore = -1,
    /// One range contains the other.
    Nested = 0,
    /// The other range starts inside this one and ends after it.
    EndsAfter = 1,
    /// The other range starts after this one ends.
    After = 2,
    /// The other range ends inside this one but starts after it, which only
    /// happens for a range whose start lies past its end.
    Degenerate = 42,
}

impl RangeRelation {
    #[must_use]
    pub fn code(self) -> i8 {
        self as i8
    }

    /// True for the three codes that denote an actual overlap.
    #[must_use]
    pub fn intersects(self) -> bool {
        matches!(self, Self::StartsBefore | Self::Nested | Self::EndsAfter)
    }
}

/// A region of a document between two positions.
///
/// `start <= end` is expected but not enforced; comparisons stay well
/// defined against the stored endpoints either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start_row: usize, start_column: usize, end_row: usize, end_column: usize) -> Self {
        Self {
            start: Position::new(start_row, start_column),
            end: Position::new(end_row, end_column),
        }
    }

    #[must_use]
    pub const fn from_points(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range at `point`.
    #[must_use]
    pub const fn at(point: Position) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    /// Locate a point against this range.
    ///
    /// `Less` if the point precedes the range, `Equal` if it lies inside
    /// (edges included), `Greater` if it follows.
    #[must_use]
    pub fn compare(&self, row: usize, column: usize) -> Ordering {
        if !self.is_multi_line() && row == self.start.row {
            return if column < self.start.column {
                Ordering::Less
            } else if column > self.end.column {
                Ordering::Greater
            } else {
                Ordering::Equal
            };
        }

        if row < self.start.row {
            return Ordering::Less;
        }
        if row > self.end.row {
            return Ordering::Greater;
        }
        if self.start.row == row {
            return if column >= self.start.column {
                Ordering::Equal
            } else {
                Ordering::Less
            };
        }
        if self.end.row == row {
            return if column <= self.end.column {
                Ordering::Equal
            } else {
                Ordering::Greater
            };
        }
        Ordering::Equal
    }

    #[must_use]
    pub fn compare_point(&self, point: Position) -> Ordering {
        self.compare(point.row, point.column)
    }

    /// Like [`compare`](Self::compare) but the start point itself counts as
    /// before the range.
    #[must_use]
    pub fn compare_start(&self, row: usize, column: usize) -> Ordering {
        if self.is_start(row, column) {
            Ordering::Less
        } else {
            self.compare(row, column)
        }
    }

    /// Like [`compare`](Self::compare) but the end point itself counts as
    /// after the range.
    #[must_use]
    pub fn compare_end(&self, row: usize, column: usize) -> Ordering {
        if self.is_end(row, column) {
            Ordering::Greater
        } else {
            self.compare(row, column)
        }
    }

    /// Both edges count as outside; the end edge wins for empty ranges.
    #[must_use]
    pub fn compare_inside(&self, row: usize, column: usize) -> Ordering {
        if self.is_end(row, column) {
            Ordering::Greater
        } else if self.is_start(row, column) {
            Ordering::Less
        } else {
            self.compare(row, column)
        }
    }

    /// Classify `other` relative to this range.
    #[must_use]
    pub fn compare_range(&self, other: &Range) -> RangeRelation {
        match self.compare_point(other.end) {
            Ordering::Greater => match self.compare_point(other.start) {
                Ordering::Greater => RangeRelation::After,
                Ordering::Equal => RangeRelation::EndsAfter,
                Ordering::Less => RangeRelation::Nested,
            },
            Ordering::Less => RangeRelation::Before,
            Ordering::Equal => match self.compare_point(other.start) {
                Ordering::Less => RangeRelation::StartsBefore,
                Ordering::Greater => RangeRelation::Degenerate,
                Ordering::Equal => RangeRelation::Nested,
            },
        }
    }

    #[must_use]
    pub fn contains(&self, row: usize, column: usize) -> bool {
        self.compare(row, column) == Ordering::Equal
    }

    #[must_use]
    pub fn contains_range(&self, other: &Range) -> bool {
        self.compare_point(other.start) == Ordering::Equal
            && self.compare_point(other.end) == Ordering::Equal
    }

    #[must_use]
    pub fn intersects(&self, other: &Range) -> bool {
        self.compare_range(other).intersects()
    }

    #[must_use]
    pub fn is_start(&self, row: usize, column: usize) -> bool {
        self.start.row == row && self.start.column == column
    }

    #[must_use]
    pub fn is_end(&self, row: usize, column: usize) -> bool {
        self.end.row == row && self.end.column == column
    }

    /// Strictly inside: contained and not on either edge.
    #[must_use]
    pub fn inside(&self, row: usize, column: usize) -> bool {
        self.contains(row, column) && !self.is_end(row, column) && !self.is_start(row, column)
    }

    /// Contained and not on the end edge.
    #[must_use]
    pub fn inside_start(&self, row: usize, column: usize) -> bool {
        self.contains(row, column) && !self.is_end(row, column)
    }

    /// Contained and not on the start edge.
    #[must_use]
    pub fn inside_end(&self, row: usize, column: usize) -> bool {
        self.contains(row, column) && !self.is_start(row, column)
    }

    pub fn set_start(&mut self, row: usize, column: usize) {
        self.start = Position::new(row, column);
    }

    pub fn set_end(&mut self, row: usize, column: usize) {
        self.end = Position::new(row, column);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub fn is_multi_line(&self) -> bool {
        self.start.row != self.end.row
    }

    /// The part of this range inside rows `first_row..=last_row`.
    ///
    /// Endpoints above the window move to `(first_row, 0)`, endpoints below
    /// it to `(last_row + 1, 0)`, so a range outside the window clips to an
    /// empty range.
    #[must_use]
    pub fn clip_rows(&self, first_row: usize, last_row: usize) -> Range {
        let clip = |point: Position| {
            if point.row > last_row {
                Position::new(last_row + 1, 0)
            } else if point.row < first_row {
                Position::new(first_row, 0)
            } else {
                point
            }
        };
        Range::from_points(clip(self.start), clip(self.end))
    }

    /// Grow the range so it covers the given point.
    #[must_use]
    pub fn extend(&self, row: usize, column: usize) -> Range {
        match self.compare(row, column) {
            Ordering::Equal => *self,
            Ordering::Less => Range::from_points(Position::new(row, column), self.end),
            Ordering::Greater => Range::from_points(self.start, Position::new(row, column)),
        }
    }

    /// Whole rows touched by this range; a trailing column-0 end is not
    /// counted as touching its row.
    #[must_use]
    pub fn collapse_rows(&self) -> Range {
        if self.end.column == 0 {
            let end_row = self.start.row.max(self.end.row.saturating_sub(1));
            Range::new(self.start.row, 0, end_row, 0)
        } else {
            Range::new(self.start.row, 0, self.end.row, 0)
        }
    }

    /// Shift both endpoints, saturating at zero.
    pub fn move_by(&mut self, rows: isize, columns: isize) {
        for point in [&mut self.start, &mut self.end] {
            point.row = point.row.saturating_add_signed(rows);
            point.column = point.column.saturating_add_signed(columns);
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range: [{}] -> [{}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_multi_line() {
        let range = Range::new(1, 4, 3, 2);
        assert_eq!(range.compare(0, 10), Ordering::Less);
        assert_eq!(range.compare(1, 3), Ordering::Less);
        assert_eq!(range.compare(1, 4), Ordering::Equal);
        assert_eq!(range.compare(2, 99), Ordering::Equal);
        assert_eq!(range.compare(3, 2), Ordering::Equal);
        assert_eq!(range.compare(3, 3), Ordering::Greater);
        assert_eq!(range.compare(4, 0), Ordering::Greater);
    }

    #[test]
    fn test_compare_single_line() {
        let range = Range::new(2, 3, 2, 6);
        assert_eq!(range.compare(2, 2), Ordering::Less);
        assert_eq!(range.compare(2, 3), Ordering::Equal);
        assert_eq!(range.compare(2, 6), Ordering::Equal);
        assert_eq!(range.compare(2, 7), Ordering::Greater);
        assert_eq!(range.compare(1, 50), Ordering::Less);
    }

    #[test]
    fn test_compare_range_codes() {
        let range = Range::new(1, 0, 3, 0);
        assert_eq!(range.compare_range(&Range::new(1, 0, 3, 0)).code(), 0);
        assert_eq!(range.compare_range(&Range::new(5, 0, 6, 0)).code(), 2);
        assert_eq!(range.compare_range(&Range::new(0, 0, 2, 0)).code(), -1);
        assert_eq!(range.compare_range(&Range::new(0, 0, 0, 5)), RangeRelation::Before);
        assert_eq!(range.compare_range(&Range::new(2, 0, 7, 0)), RangeRelation::EndsAfter);
        assert_eq!(range.compare_range(&Range::new(0, 0, 9, 0)), RangeRelation::Nested);
    }

    #[test]
    fn test_compare_range_degenerate_sentinel() {
        let range = Range::new(1, 0, 3, 0);
        // Ends inside, starts after: only an inverted range can do that.
        let inverted = Range::new(4, 0, 2, 0);
        assert_eq!(range.compare_range(&inverted), RangeRelation::Degenerate);
        assert_eq!(range.compare_range(&inverted).code(), 42);
        assert!(!range.intersects(&inverted));
    }

    #[test]
    fn test_containment_and_intersection() {
        let outer = Range::new(0, 0, 10, 0);
        assert!(outer.contains_range(&Range::new(3, 0, 5, 0)));
        assert!(!outer.contains_range(&Range::new(3, 0, 12, 0)));
        assert!(outer.intersects(&Range::new(3, 0, 12, 0)));
        assert!(!outer.intersects(&Range::new(11, 0, 12, 0)));
    }

    #[test]
    fn test_edge_predicates() {
        let range = Range::new(1, 2, 1, 8);
        assert!(range.is_start(1, 2));
        assert!(range.is_end(1, 8));
        assert!(!range.inside(1, 2));
        assert!(range.inside(1, 5));
        assert!(range.inside_start(1, 2));
        assert!(!range.inside_start(1, 8));
        assert!(range.inside_end(1, 8));
        assert_eq!(range.compare_start(1, 2), Ordering::Less);
        assert_eq!(range.compare_end(1, 8), Ordering::Greater);
        assert_eq!(range.compare_inside(1, 5), Ordering::Equal);
    }

    #[test]
    fn test_clip_rows() {
        let range = Range::new(2, 5, 8, 3);
        assert_eq!(range.clip_rows(4, 6), Range::new(4, 0, 7, 0));
        assert_eq!(range.clip_rows(0, 20), range);
        assert!(range.clip_rows(10, 12).is_empty());
        assert!(range.clip_rows(0, 0).is_empty());
    }

    #[test]
    fn test_extend_and_collapse() {
        let range = Range::new(2, 2, 2, 4);
        assert_eq!(range.extend(2, 3), range);
        assert_eq!(range.extend(1, 0), Range::new(1, 0, 2, 4));
        assert_eq!(range.extend(5, 1), Range::new(2, 2, 5, 1));
        assert_eq!(Range::new(1, 3, 4, 0).collapse_rows(), Range::new(1, 0, 3, 0));
        assert_eq!(Range::new(1, 3, 4, 2).collapse_rows(), Range::new(1, 0, 4, 0));
        assert_eq!(Range::new(1, 3, 1, 0).collapse_rows(), Range::new(1, 0, 1, 0));
    }

    #[test]
    fn test_move_by_saturates() {
        let mut range = Range::new(1, 1, 2, 5);
        range.move_by(2, -3);
        assert_eq!(range, Range::new(3, 0, 4, 2));
    }

    #[test]
    fn test_display() {
        insta::assert_snapshot!(Range::new(1, 0, 3, 7).to_string(), @"Range: [1/0] -> [3/7]");
    }
}
