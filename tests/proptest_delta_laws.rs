//! Property-based tests for the delta laws of the line buffer.
//!
//! Uses proptest to check that recorded deltas replay and revert exactly,
//! that index/position conversion is a bijection, and that anchors return
//! to their place when an insertion is taken back out.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use textcore::{Delta, Document, Position, Range};

// ============================================================================
// Strategies
// ============================================================================

/// Text with mixed line lengths and all three separators.
fn document_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => "[a-z ]{0,12}",
            1 => Just("\n".to_string()),
            1 => Just("\r\n".to_string()),
            1 => Just("é中".to_string()),
        ],
        0..16,
    )
    .prop_map(|parts| parts.concat())
}

#[derive(Clone, Debug)]
enum Edit {
    Insert { row: usize, column: usize, text: String },
    Remove { start: (usize, usize), end: (usize, usize) },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0..8usize, 0..16usize, "[a-z\n]{1,8}")
            .prop_map(|(row, column, text)| Edit::Insert { row, column, text }),
        ((0..8usize, 0..16usize), (0..8usize, 0..16usize))
            .prop_map(|(start, end)| Edit::Remove { start, end }),
    ]
}

fn apply(doc: &mut Document, edit: &Edit) {
    match edit {
        Edit::Insert { row, column, text } => {
            let at = doc.clip_position(Position::new(*row, *column));
            doc.insert(at, text);
        }
        Edit::Remove { start, end } => {
            let start = Position::new(start.0, start.1);
            let end = Position::new(end.0, end.1);
            doc.remove(Range::from_points(start.min(end), start.max(end)));
        }
    }
}

fn recorded(doc: &Document) -> Rc<RefCell<Vec<Delta>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    doc.on_change(move |delta| sink.borrow_mut().push(delta.clone()));
    log
}

// ============================================================================
// Round-trip Properties
// ============================================================================

proptest! {
    /// Reverting every recorded delta restores the original lines, and
    /// re-applying them reproduces the edited lines.
    #[test]
    fn revert_then_apply_round_trips(
        text in document_text(),
        edits in prop::collection::vec(edit(), 1..12),
    ) {
        let mut doc = Document::new(&text);
        let original = doc.all_lines().to_vec();
        let log = recorded(&doc);
        for e in &edits {
            apply(&mut doc, e);
        }
        let edited = doc.all_lines().to_vec();
        let deltas = log.borrow().clone();

        let mut replay = Document::from_lines(edited.clone());
        replay.revert_deltas(&deltas);
        prop_assert_eq!(replay.all_lines(), original.as_slice());

        replay.apply_deltas(&deltas);
        prop_assert_eq!(replay.all_lines(), edited.as_slice());
    }

    /// Edits starting from a document whose every row was removed revert
    /// back to zero rows.
    #[test]
    fn revert_restores_zero_line_document(
        text in document_text(),
        edits in prop::collection::vec(edit(), 1..8),
    ) {
        let mut doc = Document::new(&text);
        let last = doc.len() - 1;
        doc.remove_lines(0, last).expect("rows exist");
        prop_assert!(doc.is_empty());

        let log = recorded(&doc);
        for e in &edits {
            apply(&mut doc, e);
        }
        let edited = doc.all_lines().to_vec();
        let deltas = log.borrow().clone();

        doc.revert_deltas(&deltas);
        prop_assert_eq!(doc.len(), 0);
        doc.apply_deltas(&deltas);
        prop_assert_eq!(doc.all_lines(), edited.as_slice());
    }

    /// Every delta's inverse undoes exactly that delta.
    #[test]
    fn each_delta_inverts(
        text in document_text(),
        e in edit(),
    ) {
        let mut doc = Document::new(&text);
        let before = doc.all_lines().to_vec();
        let log = recorded(&doc);
        apply(&mut doc, &e);
        let inverses: Vec<Delta> = log.borrow().iter().rev().map(Delta::invert).collect();
        let mut replay = Document::from_lines(doc.all_lines().to_vec());
        replay.apply_deltas(&inverses);
        prop_assert_eq!(replay.all_lines(), before.as_slice());
    }
}

// ============================================================================
// Index/Position Properties
// ============================================================================

proptest! {
    /// position_to_index and index_to_position are inverses on valid
    /// positions.
    #[test]
    fn index_position_inverse(
        text in document_text(),
        row in 0..8usize,
        column in 0..16usize,
    ) {
        let doc = Document::new(&text);
        let position = doc.clip_position(Position::new(row, column));
        let index = doc.position_to_index(position, 0);
        prop_assert_eq!(doc.index_to_position(index, 0), position);
    }

    /// Indices map to positions that map back to the same index.
    #[test]
    fn position_index_inverse(
        text in document_text(),
        index in 0..80usize,
    ) {
        let doc = Document::new(&text);
        let total = doc.position_to_index(doc.clip_position(Position::new(usize::MAX, 0)), 0);
        let index = index.min(total);
        let position = doc.index_to_position(index, 0);
        prop_assert_eq!(doc.position_to_index(position, 0), index);
    }
}

// ============================================================================
// Anchor Properties
// ============================================================================

proptest! {
    /// Inserting text anywhere and removing it again leaves anchors where
    /// they were.
    #[test]
    fn anchor_survives_insert_and_remove(
        text in document_text(),
        anchor_at in (0..8usize, 0..16usize),
        insert_at in (0..8usize, 0..16usize),
        inserted in "[a-z\n]{1,8}",
        insert_right in any::<bool>(),
    ) {
        let mut doc = Document::new(&text);
        let anchor = doc.create_anchor(anchor_at.0, anchor_at.1);
        anchor.set_insert_right(insert_right);
        let before = anchor.raw_position();

        let start = doc.clip_position(Position::new(insert_at.0, insert_at.1));
        let end = doc.insert(start, &inserted);
        doc.remove(Range::from_points(start, end));

        prop_assert_eq!(anchor.raw_position(), before);
        prop_assert_eq!(anchor.position(&doc), before);
    }
}
