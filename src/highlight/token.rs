//! Lexical tokens produced for one document row.

use std::fmt;
use std::ops::Range;

/// A run of text on one row with its token type.
///
/// `kind` is whatever the lexer names its token types ("keyword",
/// "string.quoted", ...). `start` is the character column of the token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub start: usize,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    pub value: String,
}

impl Token {
    #[must_use]
    pub fn new(start: usize, kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            start,
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len()
    }

    /// Column span of the token.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{:?}", self.kind, self.start, self.value)
    }
}
