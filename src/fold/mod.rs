//! Code folding.
//!
//! A [`Fold`] hides a range of the document behind a placeholder. Folds that
//! render on the same display row are grouped into a [`FoldLine`], and the
//! [`FoldModel`] keeps the sorted fold lines of a document in step with its
//! edits.

mod fold;
mod fold_line;
mod folding;

pub use fold::Fold;
pub use fold_line::{FoldLine, FoldLineId, FoldPlacement, FoldSegment};
pub use folding::{FoldChange, FoldModel, FoldSide};
