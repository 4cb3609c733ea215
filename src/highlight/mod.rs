//! Syntax tokens and the background token cache.

mod background;
pub mod schedule;
pub mod token;
pub mod tokenizer;

pub use background::{BackgroundTokenizer, TokenizerOptions, TokenizerUpdate};
pub use schedule::{Clock, ManualClock, SystemClock, TaskSlot};
pub use token::Token;
pub use tokenizer::{LineState, PlainTextTokenizer, TokenizedLine, Tokenizer};
