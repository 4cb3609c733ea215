//! The single change record shared by the document, its observers and the
//! undo engine.

use std::fmt;
use std::str::FromStr;

use super::position::Position;
use super::range::Range;

/// Kind of structural edit carried by a [`Delta`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaAction {
    InsertText,
    InsertLines,
    RemoveText,
    RemoveLines,
}

impl DeltaAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertText => "insertText",
            Self::InsertLines => "insertLines",
            Self::RemoveText => "removeText",
            Self::RemoveLines => "removeLines",
        }
    }

    #[must_use]
    pub fn is_insert(self) -> bool {
        matches!(self, Self::InsertText | Self::InsertLines)
    }

    #[must_use]
    pub fn is_remove(self) -> bool {
        !self.is_insert()
    }
}

impl fmt::Display for DeltaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeltaAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insertText" => Ok(Self::InsertText),
            "insertLines" => Ok(Self::InsertLines),
            "removeText" => Ok(Self::RemoveText),
            "removeLines" => Ok(Self::RemoveLines),
            other => Err(format!("unknown delta action: {other}")),
        }
    }
}

/// One atomic edit with the range it covers.
///
/// Text deltas carry the inserted or removed characters (possibly a single
/// line separator); line deltas carry whole rows and always span
/// `(row, 0)..(row + lines.len(), 0)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "action", rename_all = "camelCase")
)]
pub enum Delta {
    InsertText { range: Range, text: String },
    InsertLines { range: Range, lines: Vec<String> },
    RemoveText { range: Range, text: String },
    RemoveLines { range: Range, lines: Vec<String> },
}

impl Delta {
    #[must_use]
    pub fn action(&self) -> DeltaAction {
        match self {
            Self::InsertText { .. } => DeltaAction::InsertText,
            Self::InsertLines { .. } => DeltaAction::InsertLines,
            Self::RemoveText { .. } => DeltaAction::RemoveText,
            Self::RemoveLines { .. } => DeltaAction::RemoveLines,
        }
    }

    #[must_use]
    pub fn range(&self) -> &Range {
        match self {
            Self::InsertText { range, .. }
            | Self::InsertLines { range, .. }
            | Self::RemoveText { range, .. }
            | Self::RemoveLines { range, .. } => range,
        }
    }

    /// Text payload of a text delta.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InsertText { text, .. } | Self::RemoveText { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Row payload of a line delta.
    #[must_use]
    pub fn lines(&self) -> Option<&[String]> {
        match self {
            Self::InsertLines { lines, .. } | Self::RemoveLines { lines, .. } => Some(lines),
            _ => None,
        }
    }

    /// Number of rows added (positive) or removed (negative).
    #[must_use]
    pub fn row_shift(&self) -> isize {
        let range = self.range();
        let rows = (range.end.row - range.start.row.min(range.end.row)) as isize;
        if self.action().is_insert() { rows } else { -rows }
    }

    /// The delta that undoes this one.
    #[must_use]
    pub fn invert(&self) -> Delta {
        match self.clone() {
            Self::InsertText { range, text } => Self::RemoveText { range, text },
            Self::RemoveText { range, text } => Self::InsertText { range, text },
            Self::InsertLines { range, lines } => Self::RemoveLines { range, lines },
            Self::RemoveLines { range, lines } => Self::InsertLines { range, lines },
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action(), self.range())
    }
}

/// Recompute a floating point after `delta` has been applied.
///
/// This is the single adjustment rule for anchors and range lists. With
/// `insert_right` set, an insertion exactly at the point leaves it in place;
/// otherwise the point travels with the inserted text.
#[must_use]
pub fn shift_point(point: Position, delta: &Delta, insert_right: bool) -> Position {
    let Range { start, end } = *delta.range();
    let Position { mut row, mut column } = point;

    // Edits confined to another row, below the point, or after it on its own
    // row cannot move it.
    if start.row == end.row && start.row != row {
        return point;
    }
    if start.row > row || (start.row == row && start.column > column) {
        return point;
    }

    match delta.action() {
        DeltaAction::InsertText => {
            if start.row == row && start.column <= column {
                if start.column == column && insert_right {
                    // stays left of the inserted text
                } else if start.row == end.row {
                    column += end.column - start.column;
                } else {
                    column = column - start.column + end.column;
                    row += end.row - start.row;
                }
            } else if start.row != end.row && start.row < row {
                row += end.row - start.row;
            }
        }
        DeltaAction::InsertLines => {
            if start.row == row && column == 0 && insert_right {
                // stays above the inserted rows
            } else if start.row <= row {
                row += end.row - start.row;
            }
        }
        DeltaAction::RemoveText => {
            if start.row == row && start.column < column {
                if end.row == row && end.column < column {
                    column -= end.column - start.column;
                } else {
                    column = start.column;
                }
            } else if start.row != end.row && start.row < row {
                if end.row > row {
                    // Removed rows enclosed the point.
                    return start;
                }
                if end.row == row {
                    column = column.saturating_sub(end.column) + start.column;
                }
                row -= end.row - start.row;
            }
        }
        DeltaAction::RemoveLines => {
            if end.row <= row {
                row -= end.row - start.row;
            } else {
                row = start.row;
                column = 0;
            }
        }
    }

    Position::new(row, column)
}
