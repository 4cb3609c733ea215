//! Line buffer, positions and the observers that track edits.
//!
//! Key types:
//!
//! - [`Document`]: the line array and its delta channel
//! - [`Range`] and [`RangeList`]: interval algebra over positions
//! - [`Anchor`]: a position that follows edits
//! - [`Delta`]: the single edit record every observer consumes
//!
//! # Examples
//!
//! ```
//! use textcore::{Document, Position, Range};
//!
//! let mut doc = Document::new("fn main() {\n}");
//! let anchor = doc.create_anchor(1, 0);
//! doc.insert(Position::new(0, 11), "\n    body();");
//! assert_eq!(anchor.raw_position(), Position::new(2, 0));
//!
//! doc.remove(Range::new(0, 11, 1, 11));
//! assert_eq!(doc.value(), "fn main() {\n}");
//! assert_eq!(anchor.raw_position(), Position::new(1, 0));
//! ```

mod anchor;
mod delta;
mod document;
mod position;
mod range;
mod range_list;

pub use anchor::{Anchor, AnchorChange};
pub use delta::{Delta, DeltaAction, shift_point};
pub use document::{Document, NewLineMode};
pub use position::Position;
pub use range::{Range, RangeRelation};
pub use range_list::{RangeList, RangeListPolicy};

pub(crate) use document::{byte_offset, char_len, split_lines};
