//! A document together with everything that follows its edits.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::event::Subscription;
use crate::fold::{Fold, FoldChange, FoldModel, FoldSide};
use crate::highlight::{BackgroundTokenizer, LineState, Token, Tokenizer, TokenizerOptions};
use crate::text::{Delta, Document, Position, Range};
use crate::undo::{UndoManager, UndoTarget};

/// Edit session: a [`Document`], its folds and token cache, and undo
/// recording.
///
/// Every delta the document emits is recorded into a pending group until
/// [`mark_undo_group`](Self::mark_undo_group) hands it to the undo manager.
/// Deltas replayed by undo and redo are not recorded. Folds removed by an
/// edit are recorded with it and come back when the edit is undone.
///
/// ```
/// use std::sync::Arc;
/// use textcore::{EditSession, PlainTextTokenizer, Position};
///
/// let mut session = EditSession::new("hello", Arc::new(PlainTextTokenizer));
/// session.insert(Position::new(0, 5), " world");
/// session.mark_undo_group(false);
/// assert_eq!(session.value(), "hello world");
///
/// session.undo();
/// assert_eq!(session.value(), "hello");
/// ```
pub struct EditSession {
    doc: Document,
    folds: FoldModel,
    tokens: BackgroundTokenizer,
    undo: UndoManager,
    pending: Rc<RefCell<Vec<Delta>>>,
    pending_folds: Rc<RefCell<Vec<(usize, Fold)>>>,
    replaying: Rc<Cell<bool>>,
    editing: Rc<Cell<bool>>,
    _recorder: Subscription<Delta>,
}

impl EditSession {
    #[must_use]
    pub fn new(text: &str, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self::with_options(text, tokenizer, TokenizerOptions::default())
    }

    #[must_use]
    pub fn with_options(text: &str, tokenizer: Arc<dyn Tokenizer>, options: TokenizerOptions) -> Self {
        Self::from_parts(Document::new(text), BackgroundTokenizer::with_options(tokenizer, options))
    }

    /// Assemble a session around an existing document and token cache.
    #[must_use]
    pub fn from_parts(doc: Document, mut tokens: BackgroundTokenizer) -> Self {
        let mut folds = FoldModel::new();
        folds.attach(&doc);
        tokens.set_document(&doc);

        let pending = Rc::new(RefCell::new(Vec::new()));
        let replaying = Rc::new(Cell::new(false));
        let id = {
            let pending = Rc::clone(&pending);
            let replaying = Rc::clone(&replaying);
            doc.on_change(move |delta: &Delta| {
                if !replaying.get() {
                    pending.borrow_mut().push(delta.clone());
                }
            })
        };
        let recorder = Subscription::new(doc.changes(), id);

        // The fold model sees each delta before the recorder, so the index
        // is that of the delta doing the removal.
        let pending_folds = Rc::new(RefCell::new(Vec::new()));
        let editing = Rc::new(Cell::new(false));
        {
            let pending = Rc::clone(&pending);
            let pending_folds = Rc::clone(&pending_folds);
            let editing = Rc::clone(&editing);
            folds.on_fold_change(move |change| {
                if let FoldChange::Removed(fold) = change {
                    if editing.get() {
                        let at = pending.borrow().len();
                        pending_folds.borrow_mut().push((at, fold.clone()));
                    }
                }
            });
        }
        tokens.start(&doc, 0);

        Self {
            doc,
            folds,
            tokens,
            undo: UndoManager::new(),
            pending,
            pending_folds,
            replaying,
            editing,
            _recorder: recorder,
        }
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub fn folds(&self) -> &FoldModel {
        &self.folds
    }

    #[must_use]
    pub fn tokenizer(&self) -> &BackgroundTokenizer {
        &self.tokens
    }

    #[must_use]
    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn undo_manager_mut(&mut self) -> &mut UndoManager {
        &mut self.undo
    }

    #[must_use]
    pub fn value(&self) -> String {
        self.doc.value()
    }

    /// Replace the whole text. History is dropped.
    pub fn set_value(&mut self, text: &str) {
        self.doc.set_value(text);
        self.pending.borrow_mut().clear();
        self.pending_folds.borrow_mut().clear();
        self.undo.reset();
        self.tokens.start(&self.doc, 0);
    }

    pub fn insert(&mut self, position: Position, text: &str) -> Position {
        self.edit(|doc| doc.insert(position, text))
    }

    pub fn remove(&mut self, range: Range) -> Position {
        self.edit(|doc| doc.remove(range))
    }

    pub fn replace(&mut self, range: Range, text: &str) -> Position {
        self.edit(|doc| doc.replace(range, text))
    }

    // Folds removed while `editing` is set are recorded for undo.
    fn edit<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        self.editing.set(true);
        let result = f(&mut self.doc);
        self.editing.set(false);
        result
    }

    /// Hand the recorded edits to the undo manager as one step, or append
    /// them to the previous step when `merge` is set.
    ///
    /// Returns `false` if nothing was recorded since the last call.
    pub fn mark_undo_group(&mut self, merge: bool) -> bool {
        let deltas = self.pending.take();
        let folds = self.pending_folds.take();
        if deltas.is_empty() {
            return false;
        }
        trace!(deltas = deltas.len(), folds = folds.len(), merge, "undo group recorded");
        self.undo.execute_with_folds(deltas, folds, merge);
        true
    }

    /// Undo the last step. Pending edits are grouped first.
    pub fn undo(&mut self) -> Option<Range> {
        self.mark_undo_group(false);
        let mut undo = std::mem::take(&mut self.undo);
        let selection = undo.undo(self);
        self.undo = undo;
        selection
    }

    pub fn redo(&mut self) -> Option<Range> {
        self.mark_undo_group(false);
        let mut undo = std::mem::take(&mut self.undo);
        let selection = undo.redo(self);
        self.undo = undo;
        selection
    }

    #[must_use]
    pub fn get_tokens(&self, row: usize) -> Vec<Token> {
        self.tokens.get_tokens(&self.doc, row)
    }

    #[must_use]
    pub fn get_state(&self, row: usize) -> LineState {
        self.tokens.get_state(&self.doc, row)
    }

    #[must_use]
    pub fn token_at(&self, row: usize, column: Option<usize>) -> Option<(usize, Token)> {
        self.tokens.token_at(&self.doc, row, column)
    }

    /// Run a due background tokenizer batch.
    pub fn poll_tokens(&self) -> bool {
        self.tokens.poll(&self.doc)
    }

    pub fn set_tokenizer(&self, tokenizer: Arc<dyn Tokenizer>) {
        self.tokens.set_tokenizer(&self.doc, tokenizer);
    }

    pub fn add_fold(&self, placeholder: &str, range: Range) -> Result<Fold> {
        self.folds.add_fold(&self.doc, placeholder, range)
    }

    #[must_use]
    pub fn fold_at(&self, row: usize, column: usize) -> Option<Fold> {
        self.folds.fold_at(row, column, FoldSide::Any)
    }

    pub fn expand_fold(&self, fold: &Fold) -> Result<()> {
        self.folds.expand_fold(&self.doc, fold)
    }

    pub fn unfold(&self, range: Option<Range>, expand_inner: bool) -> Vec<Fold> {
        self.folds.unfold(&self.doc, range, expand_inner)
    }

    #[must_use]
    pub fn display_line(&self, row: usize) -> String {
        self.folds.display_line(&self.doc, row, None, None)
    }

    fn replay(&mut self, deltas: &[Delta], revert: bool) {
        self.replaying.set(true);
        if revert {
            self.doc.revert_deltas(deltas);
        } else {
            self.doc.apply_deltas(deltas);
        }
        self.replaying.set(false);
        debug!(deltas = deltas.len(), revert, "session replayed deltas");
    }
}

impl UndoTarget for EditSession {
    fn revert_deltas(&mut self, deltas: &[Delta]) {
        self.replay(deltas, true);
    }

    fn apply_deltas(&mut self, deltas: &[Delta]) {
        self.replay(deltas, false);
    }

    fn restore_folds(&mut self, folds: &[Fold]) {
        for fold in folds {
            if let Err(err) = self.folds.insert_fold(&self.doc, fold.clone()) {
                warn!(fold = %fold, error = %err, "fold could not be restored");
            }
        }
    }
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("doc", &self.doc)
            .field("folds", &self.folds)
            .field("tokens", &self.tokens)
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}
