//! `textcore` - text model for code editors
//!
//! A line buffer that describes every edit as a [`Delta`], plus the
//! structures that stay consistent with it: anchors, range lists, code
//! folds, an incremental token cache and an undo/redo engine.
//!
//! All observers share the document's change channel and update
//! synchronously inside the edit that produced the delta. Only re-lexing is
//! deferred; the host drives it through [`BackgroundTokenizer::poll`].

// Crate-level lint configuration
#![forbid(unsafe_code)]
#![allow(clippy::cast_possible_truncation)] // Intentional row/column casts
#![allow(clippy::cast_sign_loss)] // Signed shifts applied to unsigned positions
#![allow(clippy::cast_possible_wrap)] // Row counts never approach isize::MAX
#![allow(clippy::module_name_repetitions)] // Allow fold::FoldLine etc
#![allow(clippy::module_inception)] // fold::fold holds the Fold type
#![allow(clippy::missing_errors_doc)] // Docs WIP
#![allow(clippy::missing_panics_doc)] // Docs WIP
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::needless_pass_by_value)] // Allow pass by value for small Copy types
#![allow(clippy::should_implement_trait)] // from_str naming is intentional
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::cast_lossless)] // as casts are fine for primitive widening
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine

pub mod error;
pub mod event;
pub mod fold;
pub mod highlight;
pub mod session;
pub mod text;
pub mod undo;

// Re-export core types at crate root
pub use error::{Error, Result};
pub use event::{Emitter, ListenerId, Subscription};

// Re-export text model types
pub use text::{
    Anchor, AnchorChange, Delta, DeltaAction, Document, NewLineMode, Position, Range,
    RangeList, RangeListPolicy, RangeRelation,
};

// Re-export folding types
pub use fold::{Fold, FoldChange, FoldLine, FoldModel, FoldSide};

// Re-export highlighting types
pub use highlight::{
    BackgroundTokenizer, LineState, PlainTextTokenizer, Token, TokenizedLine, Tokenizer,
    TokenizerOptions, TokenizerUpdate,
};

pub use session::EditSession;
pub use undo::{UndoManager, UndoTarget};
