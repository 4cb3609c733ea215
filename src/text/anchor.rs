//! Floating positions that follow document edits.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::delta::{Delta, shift_point};
use super::document::Document;
use super::position::Position;
use crate::event::{Emitter, ListenerId, Subscription};

/// Payload of an anchor move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorChange {
    pub old: Position,
    pub value: Position,
}

struct AnchorState {
    point: Cell<Position>,
    insert_right: Cell<bool>,
    changes: Emitter<AnchorChange>,
}

impl AnchorState {
    fn on_delta(&self, delta: &Delta) {
        let old = self.point.get();
        let value = shift_point(old, delta, self.insert_right.get());
        self.move_to(value);
    }

    fn move_to(&self, value: Position) {
        let old = self.point.replace(value);
        if old != value {
            self.changes.emit(&AnchorChange { old, value });
        }
    }
}

/// A position that moves with the text around it.
///
/// The anchor listens on its document's change channel until it is
/// detached or dropped. The document never owns the anchor.
pub struct Anchor {
    state: Rc<AnchorState>,
    subscription: Option<Subscription<Delta>>,
}

impl Anchor {
    /// Create an anchor at `(row, column)` clipped to `doc`, and attach it.
    #[must_use]
    pub fn new(doc: &Document, row: usize, column: usize) -> Self {
        let mut anchor = Self {
            state: Rc::new(AnchorState {
                point: Cell::new(clip_to_document(doc, row, column)),
                insert_right: Cell::new(false),
                changes: Emitter::new(),
            }),
            subscription: None,
        };
        anchor.attach(doc);
        anchor
    }

    /// Stored position, which may lie outside a document that shrank while
    /// the anchor was detached.
    #[must_use]
    pub fn raw_position(&self) -> Position {
        self.state.point.get()
    }

    /// Position clipped against the current content of `doc`.
    #[must_use]
    pub fn position(&self, doc: &Document) -> Position {
        let Position { row, column } = self.raw_position();
        clip_to_document(doc, row, column)
    }

    #[must_use]
    pub fn row(&self) -> usize {
        self.raw_position().row
    }

    #[must_use]
    pub fn column(&self) -> usize {
        self.raw_position().column
    }

    /// Move to `(row, column)` clipped to `doc`.
    pub fn set_position(&self, doc: &Document, row: usize, column: usize) {
        self.state.move_to(clip_to_document(doc, row, column));
    }

    /// Move without clipping.
    pub fn set_position_unclipped(&self, row: usize, column: usize) {
        self.state.move_to(Position::new(row, column));
    }

    #[must_use]
    pub fn insert_right(&self) -> bool {
        self.state.insert_right.get()
    }

    /// Whether text inserted exactly at the anchor ends up after it.
    pub fn set_insert_right(&self, insert_right: bool) {
        self.state.insert_right.set(insert_right);
    }

    /// Listen for position changes.
    pub fn on_change<F>(&self, handler: F) -> ListenerId
    where
        F: FnMut(&AnchorChange) + 'static,
    {
        self.state.changes.on(handler)
    }

    pub fn off_change(&self, id: ListenerId) -> bool {
        self.state.changes.off(id)
    }

    /// Start following `doc`, leaving any previous document.
    pub fn attach(&mut self, doc: &Document) {
        if let Some(subscription) = &self.subscription {
            if subscription.is_on(doc.changes()) {
                return;
            }
        }
        let weak = Rc::downgrade(&self.state);
        let id = doc.changes().on_while(move |delta| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            state.on_delta(delta);
            true
        });
        self.subscription = Some(Subscription::new(doc.changes(), id));
    }

    /// Stop following edits. The stored position is kept.
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_live)
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("position", &self.raw_position())
            .field("insert_right", &self.insert_right())
            .field("attached", &self.is_attached())
            .finish()
    }
}

fn clip_to_document(doc: &Document, row: usize, column: usize) -> Position {
    doc.clip_position(Position::new(row, column))
}
