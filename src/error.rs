//! Error types for textcore.
//!
//! Only structural violations surface as errors. Out-of-range positions are
//! clamped and tokenizer cache mismatches are repaired silently.

use std::fmt;

use crate::text::Range;

/// Result type alias for textcore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for textcore operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A fold partially overlaps an existing fold instead of nesting in it.
    FoldOverlap { fold: Range, existing: Range },
    /// A fold must hide at least two characters.
    FoldTooSmall { range: Range },
    /// A fold shares no row with the fold line it was added to.
    DisconnectedFold { fold: Range, line: Range },
    /// Row window outside the document.
    RowsOutOfBounds {
        first_row: usize,
        last_row: usize,
        len: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FoldOverlap { fold, existing } => {
                write!(
                    f,
                    "a fold can't intersect an already existing fold: {fold} overlaps {existing}"
                )
            }
            Self::FoldTooSmall { range } => {
                write!(f, "a fold has to be at least 2 characters wide: {range}")
            }
            Self::DisconnectedFold { fold, line } => {
                write!(f, "fold {fold} has no row in common with fold line {line}")
            }
            Self::RowsOutOfBounds {
                first_row,
                last_row,
                len,
            } => write!(
                f,
                "rows {first_row}..={last_row} out of bounds for document of {len} lines"
            ),
        }
    }
}

impl std::error::Error for Error {}
