//! Line buffer that applies and reverts deltas.
//!
//! [`Document`] stores text as a vector of lines without separators. Every
//! mutation is decomposed into one or more [`Delta`]s, each of which is
//! applied to the line array first and then delivered to the change
//! listeners. Anchors, range lists, folds and the background tokenizer all
//! listen on that single channel.
//!
//! # Examples
//!
//! ```
//! use textcore::{Document, Position};
//!
//! let mut doc = Document::new("hello\nworld");
//! let end = doc.insert(Position::new(0, 5), ",\nbig");
//! assert_eq!(end, Position::new(1, 3));
//! assert_eq!(doc.value(), "hello,\nbig\nworld");
//! ```

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use tracing::trace;

use super::anchor::Anchor;
use super::delta::Delta;
use super::position::Position;
use super::range::Range;
use crate::error::{Error, Result};
use crate::event::{Emitter, ListenerId};

/// Line separator used when serializing a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NewLineMode {
    /// Always `\r\n`.
    Windows,
    /// Always `\n`.
    Unix,
    /// Whatever separator the first insert into a short document contained.
    #[default]
    Auto,
}

impl NewLineMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Unix => "unix",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for NewLineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewLineMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(Self::Windows),
            "unix" => Ok(Self::Unix),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown newline mode: {other}")),
        }
    }
}

/// Split on `\r\n`, `\r` and `\n`. Always yields at least one piece.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&text[start..]);
    lines
}

fn first_separator(text: &str) -> Option<&'static str> {
    let index = text.find(['\r', '\n'])?;
    let rest = &text[index..];
    Some(if rest.starts_with("\r\n") {
        "\r\n"
    } else if rest.starts_with('\r') {
        "\r"
    } else {
        "\n"
    })
}

pub(crate) fn char_len(line: &str) -> usize {
    line.chars().count()
}

/// Byte offset of character `column`, clamped to the end of `line`.
pub(crate) fn byte_offset(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map_or(line.len(), |(offset, _)| offset)
}

/// Text content as an array of lines plus a change channel.
pub struct Document {
    lines: Vec<String>,
    new_line_mode: NewLineMode,
    auto_new_line: Option<&'static str>,
    changes: Rc<Emitter<Delta>>,
}

impl Document {
    /// Create a document holding `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut doc = Self::empty();
        doc.insert(Position::zero(), text);
        doc
    }

    /// Create a document from lines that contain no separators.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut doc = Self::empty();
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if !lines.is_empty() {
            doc.lines = lines;
        }
        doc
    }

    fn empty() -> Self {
        Self {
            lines: vec![String::new()],
            new_line_mode: NewLineMode::Auto,
            auto_new_line: None,
            changes: Rc::new(Emitter::new()),
        }
    }

    /// Register a listener for every delta applied to this document.
    pub fn on_change<F>(&self, handler: F) -> ListenerId
    where
        F: FnMut(&Delta) + 'static,
    {
        self.changes.on(handler)
    }

    pub fn off_change(&self, id: ListenerId) -> bool {
        self.changes.off(id)
    }

    /// The shared change channel, for observers that hold a subscription.
    #[must_use]
    pub fn changes(&self) -> &Rc<Emitter<Delta>> {
        &self.changes
    }

    /// Create an anchor attached to this document.
    #[must_use]
    pub fn create_anchor(&self, row: usize, column: usize) -> Anchor {
        Anchor::new(self, row, column)
    }

    /// Full text joined with the current line separator.
    #[must_use]
    pub fn value(&self) -> String {
        self.lines.join(self.new_line_character())
    }

    /// Replace the whole content.
    pub fn set_value(&mut self, text: &str) {
        let len = self.len();
        if len > 0 {
            let last = len - 1;
            self.remove(Range::new(0, 0, last, char_len(&self.lines[last])));
        }
        self.insert(Position::zero(), text);
    }

    #[must_use]
    pub fn new_line_mode(&self) -> NewLineMode {
        self.new_line_mode
    }

    pub fn set_new_line_mode(&mut self, mode: NewLineMode) {
        self.new_line_mode = mode;
    }

    /// Separator used by [`value`](Self::value) and index conversion.
    #[must_use]
    pub fn new_line_character(&self) -> &'static str {
        match self.new_line_mode {
            NewLineMode::Windows => "\r\n",
            NewLineMode::Unix => "\n",
            NewLineMode::Auto => self.auto_new_line.unwrap_or("\n"),
        }
    }

    #[must_use]
    pub fn is_new_line(&self, text: &str) -> bool {
        matches!(text, "\r\n" | "\r" | "\n")
    }

    /// Line `row`, or `""` past the end.
    #[must_use]
    pub fn line(&self, row: usize) -> &str {
        self.lines.get(row).map_or("", String::as_str)
    }

    /// Length in characters of line `row`.
    #[must_use]
    pub fn line_len(&self, row: usize) -> usize {
        char_len(self.line(row))
    }

    /// Lines `first..=last`, clamped to the document.
    #[must_use]
    pub fn lines(&self, first: usize, last: usize) -> &[String] {
        let end = last.saturating_add(1).min(self.lines.len());
        let start = first.min(end);
        &self.lines[start..end]
    }

    #[must_use]
    pub fn all_lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether every line was removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Text covered by `range`, joined with the current separator.
    #[must_use]
    pub fn text_range(&self, range: Range) -> String {
        let start = self.clip_position(range.start);
        let end = self.clip_position(range.end);
        if start >= end {
            return String::new();
        }
        let first = self.line(start.row);
        if start.row == end.row {
            let from = byte_offset(first, start.column);
            let to = byte_offset(first, end.column);
            return first[from..to].to_string();
        }
        let mut parts = Vec::with_capacity(end.row - start.row + 1);
        parts.push(&first[byte_offset(first, start.column)..]);
        for row in start.row + 1..end.row {
            parts.push(self.line(row));
        }
        let last = self.line(end.row);
        parts.push(&last[..byte_offset(last, end.column)]);
        parts.join(self.new_line_character())
    }

    /// Clamp a position into the document.
    ///
    /// Rows past the end clamp to the end of the last line; columns clamp
    /// to the line length.
    #[must_use]
    pub fn clip_position(&self, position: Position) -> Position {
        let len = self.len();
        if len == 0 {
            return Position::zero();
        }
        if position.row >= len {
            let row = len - 1;
            return Position::new(row, self.line_len(row));
        }
        Position::new(position.row, position.column.min(self.line_len(position.row)))
    }

    /// Insert `text` at `position`, returning the end of the inserted text.
    pub fn insert(&mut self, position: Position, text: &str) -> Position {
        if text.is_empty() {
            return position;
        }
        if self.len() <= 1 {
            self.detect_new_line(text);
        }

        let parts = split_lines(text);
        let mut position = self.insert_in_line(position, parts[0]);
        if let Some((last, middle)) = parts[1..].split_last() {
            position = self.insert_new_line(position);
            let middle = middle.iter().map(|line| (*line).to_string()).collect();
            position = self.insert_full_lines(position.row, middle);
            position = self.insert_in_line(position, last);
        }
        position
    }

    /// Insert whole lines before `row`. Past the end they are appended.
    pub fn insert_lines(&mut self, row: usize, lines: Vec<String>) -> Position {
        if row >= self.len() {
            let mut text = String::from("\n");
            text.push_str(&lines.join("\n"));
            let end = Position::new(self.len(), 0);
            return self.insert(end, &text);
        }
        self.insert_full_lines(row, lines)
    }

    /// Split the line at `position`.
    pub fn insert_new_line(&mut self, position: Position) -> Position {
        let position = self.ensure_line(position);
        let offset = byte_offset(&self.lines[position.row], position.column);
        let tail = self.lines[position.row].split_off(offset);
        self.lines.insert(position.row + 1, tail);

        let end = Position::new(position.row + 1, 0);
        self.emit(Delta::InsertText {
            range: Range::from_points(position, end),
            text: self.new_line_character().to_string(),
        });
        end
    }

    /// Insert separator-free `text` into a single line.
    pub fn insert_in_line(&mut self, position: Position, text: &str) -> Position {
        if text.is_empty() {
            return position;
        }
        let position = self.ensure_line(position);
        let offset = byte_offset(&self.lines[position.row], position.column);
        self.lines[position.row].insert_str(offset, text);

        let end = Position::new(position.row, position.column + char_len(text));
        self.emit(Delta::InsertText {
            range: Range::from_points(position, end),
            text: text.to_string(),
        });
        end
    }

    /// Remove `range`, returning its start.
    pub fn remove(&mut self, range: Range) -> Position {
        let start = self.clip_position(range.start.min(range.end));
        let end = self.clip_position(range.start.max(range.end));
        if start == end {
            return start;
        }

        let first_row = start.row;
        let last_row = end.row;
        if start.row == end.row {
            self.remove_in_line(first_row, start.column, end.column);
            return start;
        }

        let first_full = if start.column == 0 { first_row } else { first_row + 1 };
        let last_full = last_row - 1;

        if end.column > 0 {
            self.remove_in_line(last_row, 0, end.column);
        }
        if last_full >= first_full {
            self.remove_full_lines(first_full, last_full);
        }
        if first_full != first_row {
            let len = self.line_len(first_row);
            self.remove_in_line(first_row, start.column, len);
            self.remove_new_line(first_row);
        }
        start
    }

    /// Remove characters `start_column..end_column` of `row`.
    pub fn remove_in_line(&mut self, row: usize, start_column: usize, end_column: usize) -> Position {
        let Some(line) = self.lines.get_mut(row) else {
            return Position::new(row, start_column);
        };
        let len = char_len(line);
        let end_column = end_column.min(len);
        let start_column = start_column.min(end_column);
        if start_column == end_column {
            return Position::new(row, start_column);
        }
        let from = byte_offset(line, start_column);
        let to = byte_offset(line, end_column);
        let removed: String = line.drain(from..to).collect();

        let start = Position::new(row, start_column);
        self.emit(Delta::RemoveText {
            range: Range::from_points(start, Position::new(row, end_column)),
            text: removed,
        });
        start
    }

    /// Remove rows `first_row..=last_row`, returning them.
    pub fn remove_lines(&mut self, first_row: usize, last_row: usize) -> Result<Vec<String>> {
        if first_row > last_row || last_row >= self.len() {
            return Err(Error::RowsOutOfBounds {
                first_row,
                last_row,
                len: self.len(),
            });
        }
        Ok(self.remove_full_lines(first_row, last_row))
    }

    /// Join `row` with the row below it.
    pub fn remove_new_line(&mut self, row: usize) {
        if row + 1 >= self.len() {
            return;
        }
        let next = self.lines.remove(row + 1);
        let line = &mut self.lines[row];
        let column = char_len(line);
        line.push_str(&next);

        self.emit(Delta::RemoveText {
            range: Range::new(row, column, row + 1, 0),
            text: self.new_line_character().to_string(),
        });
    }

    /// Replace `range` with `text`, returning the end of the new text.
    ///
    /// Emits nothing when `text` already equals the covered content.
    pub fn replace(&mut self, range: Range, text: &str) -> Position {
        if text.is_empty() && range.is_empty() {
            return range.start;
        }
        if self.text_range(range) == text {
            return self.clip_position(range.end);
        }
        let start = self.remove(range);
        if text.is_empty() {
            start
        } else {
            self.insert(start, text)
        }
    }

    /// Apply `deltas` in order.
    pub fn apply_deltas(&mut self, deltas: &[Delta]) {
        for delta in deltas {
            match delta {
                Delta::InsertLines { range, lines } => {
                    self.insert_full_lines(range.start.row, lines.clone());
                }
                Delta::InsertText { range, text } => {
                    self.insert(range.start, text);
                }
                Delta::RemoveLines { range, .. } => {
                    self.remove_row_span(range);
                }
                Delta::RemoveText { range, .. } => {
                    self.remove(*range);
                }
            }
        }
    }

    /// Apply the inverse of `deltas` in reverse order.
    pub fn revert_deltas(&mut self, deltas: &[Delta]) {
        for delta in deltas.iter().rev() {
            match delta {
                Delta::InsertLines { range, .. } => {
                    self.remove_row_span(range);
                }
                Delta::InsertText { range, .. } => {
                    self.remove(*range);
                }
                Delta::RemoveLines { range, lines } => {
                    self.insert_full_lines(range.start.row, lines.clone());
                }
                Delta::RemoveText { range, text } => {
                    self.insert(range.start, text);
                }
            }
        }
    }

    /// Convert a character index to a position, counting from `start_row`.
    ///
    /// Each line contributes its length plus the separator length. Indices
    /// past the end clamp to the end of the document.
    #[must_use]
    pub fn index_to_position(&self, index: usize, start_row: usize) -> Position {
        let separator = self.new_line_character().len();
        let mut remaining = index;
        for row in start_row..self.len() {
            let width = self.line_len(row) + separator;
            if remaining < width {
                return Position::new(row, remaining);
            }
            remaining -= width;
        }
        let last = self.len().saturating_sub(1);
        Position::new(last, self.line_len(last))
    }

    /// Convert a position to a character index, counting from `start_row`.
    #[must_use]
    pub fn position_to_index(&self, position: Position, start_row: usize) -> usize {
        let separator = self.new_line_character().len();
        let end = position.row.min(self.len());
        let preceding: usize = (start_row.min(end)..end)
            .map(|row| self.line_len(row) + separator)
            .sum();
        preceding + position.column
    }

    fn detect_new_line(&mut self, text: &str) {
        self.auto_new_line = Some(first_separator(text).unwrap_or("\n"));
    }

    // Clip and make sure at least one line exists to write into. The new
    // line is emitted so that reverting the edit empties the document again.
    fn ensure_line(&mut self, position: Position) -> Position {
        if self.lines.is_empty() {
            self.insert_full_lines(0, vec![String::new()]);
        }
        self.clip_position(position)
    }

    fn insert_full_lines(&mut self, row: usize, lines: Vec<String>) -> Position {
        if lines.is_empty() {
            return Position::new(row, 0);
        }
        let row = row.min(self.len());
        let count = lines.len();
        self.lines.splice(row..row, lines.iter().cloned());

        let end = Position::new(row + count, 0);
        self.emit(Delta::InsertLines {
            range: Range::new(row, 0, row + count, 0),
            lines,
        });
        end
    }

    fn remove_full_lines(&mut self, first_row: usize, last_row: usize) -> Vec<String> {
        let removed: Vec<String> = self.lines.drain(first_row..=last_row).collect();
        self.emit(Delta::RemoveLines {
            range: Range::new(first_row, 0, last_row + 1, 0),
            lines: removed.clone(),
        });
        removed
    }

    // Rows covered by a line delta's `(first, 0)..(last + 1, 0)` range.
    fn remove_row_span(&mut self, range: &Range) {
        let first = range.start.row;
        let last = range.end.row.saturating_sub(1).min(self.len().saturating_sub(1));
        if range.end.row > first && first <= last && first < self.len() {
            self.remove_full_lines(first, last);
        }
    }

    fn emit(&self, delta: Delta) {
        trace!(action = %delta.action(), range = %delta.range(), "document change");
        self.changes.emit(&delta);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("lines", &self.lines.len())
            .field("new_line_mode", &self.new_line_mode)
            .field("listeners", &self.changes.len())
            .finish()
    }
}
