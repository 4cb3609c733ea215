//! Lexer contract and the state carried from row to row.

use std::fmt;

use super::token::Token;
use crate::text::split_lines;

/// Lexer state at the end of a row.
///
/// Opaque to everything but the lexer that produced it. States compare as
/// strings, so a state stack and its rendered form are the same state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LineState(String);

impl LineState {
    pub const START: &'static str = "start";

    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    /// State for a stack of nested lexer states, innermost first.
    #[must_use]
    pub fn from_stack<S: AsRef<str>>(stack: &[S]) -> Self {
        let parts: Vec<&str> = stack.iter().map(AsRef::as_ref).collect();
        Self(parts.join(","))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The stack entries of this state, innermost first.
    pub fn stack(&self) -> impl Iterator<Item = &str> {
        self.0.split(',')
    }

    #[must_use]
    pub fn is_start(&self) -> bool {
        self.0 == Self::START
    }
}

impl Default for LineState {
    fn default() -> Self {
        Self(Self::START.to_string())
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineState {
    fn from(state: &str) -> Self {
        Self::new(state)
    }
}

impl From<String> for LineState {
    fn from(state: String) -> Self {
        Self(state)
    }
}

/// Tokens of one row and the lexer state after it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenizedLine {
    pub tokens: Vec<Token>,
    pub state: LineState,
}

impl TokenizedLine {
    #[must_use]
    pub fn new(tokens: Vec<Token>, state: LineState) -> Self {
        Self { tokens, state }
    }
}

/// A line lexer. Grammar rules live entirely behind this trait.
pub trait Tokenizer: Send + Sync {
    /// Tokenize `line` starting in `state`, the end state of the row above.
    fn tokenize_line(&self, line: &str, state: &LineState) -> TokenizedLine;

    /// State used for the first row.
    fn start_state(&self) -> LineState {
        LineState::default()
    }

    /// Tokenize a whole text row by row. Token starts are columns within
    /// their own row.
    fn tokenize(&self, text: &str) -> Vec<TokenizedLine> {
        let mut state = self.start_state();
        split_lines(text)
            .into_iter()
            .map(|line| {
                let row = self.tokenize_line(line, &state);
                state = row.state.clone();
                row
            })
            .collect()
    }
}

/// Emits one `text` token per non-empty row and never changes state.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextTokenizer;

impl PlainTextTokenizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for PlainTextTokenizer {
    fn tokenize_line(&self, line: &str, state: &LineState) -> TokenizedLine {
        let tokens = if line.is_empty() {
            Vec::new()
        } else {
            vec![Token::new(0, "text", line)]
        };
        TokenizedLine::new(tokens, state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{LineState, PlainTextTokenizer, Token, TokenizedLine, Tokenizer};

    struct StubTokenizer;

    impl Tokenizer for StubTokenizer {
        fn tokenize_line(&self, line: &str, state: &LineState) -> TokenizedLine {
            let next = if line.ends_with('{') {
                LineState::from_stack(&["block", state.as_str()])
            } else {
                state.clone()
            };
            TokenizedLine::new(vec![Token::new(0, "text", line)], next)
        }
    }

    #[test]
    fn line_state_default_is_start() {
        assert_eq!(LineState::default().as_str(), "start");
        assert!(LineState::default().is_start());
        assert!(!LineState::from("string").is_start());
    }

    #[test]
    fn line_state_stack_matches_rendered_form() {
        let stack = LineState::from_stack(&["comment", "start"]);
        assert_eq!(stack, LineState::from("comment,start"));
        assert_eq!(stack.stack().collect::<Vec<_>>(), ["comment", "start"]);
        assert_eq!(stack.to_string(), "comment,start");
    }

    #[test]
    fn tokenize_threads_state_across_rows() {
        let rows = StubTokenizer.tokenize("fn a() {\r\n  b\n}");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].state.as_str(), "block,start");
        assert_eq!(rows[1].state.as_str(), "block,start");
        assert_eq!(rows[2].tokens[0].value, "}");
    }

    #[test]
    fn plain_text_keeps_state() {
        let state = LineState::from("custom");
        let row = PlainTextTokenizer.tokenize_line("hello", &state);
        assert_eq!(row.tokens, [Token::new(0, "text", "hello")]);
        assert_eq!(row.state, state);
        assert!(PlainTextTokenizer.tokenize_line("", &state).tokens.is_empty());
    }

    #[test]
    fn tokenizer_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PlainTextTokenizer>();
    }
}
