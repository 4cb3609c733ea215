//! Fuzz target for delta replay.
//!
//! Applies arbitrary edits to a document, then checks that reverting the
//! recorded deltas restores the original lines and that re-applying them
//! reproduces the edited lines.

#![no_main]

use std::cell::RefCell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use textcore::{Document, Position, Range};

#[derive(Arbitrary, Debug)]
enum Edit {
    Insert { row: u8, column: u8, text: String },
    Remove { start: (u8, u8), end: (u8, u8) },
    RemoveLines { first: u8, last: u8 },
    Replace { start: (u8, u8), end: (u8, u8), text: String },
}

#[derive(Arbitrary, Debug)]
struct Input {
    text: String,
    edits: Vec<Edit>,
}

fn position((row, column): (u8, u8)) -> Position {
    Position::new(row.into(), column.into())
}

fn range(a: (u8, u8), b: (u8, u8)) -> Range {
    let (a, b) = (position(a), position(b));
    Range::from_points(a.min(b), a.max(b))
}

fuzz_target!(|input: Input| {
    let mut doc = Document::new(&input.text);
    let original = doc.all_lines().to_vec();

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    doc.on_change(move |delta| sink.borrow_mut().push(delta.clone()));

    for edit in input.edits.iter().take(64) {
        match edit {
            Edit::Insert { row, column, text } => {
                let at = doc.clip_position(position((*row, *column)));
                doc.insert(at, text);
            }
            Edit::Remove { start, end } => {
                doc.remove(range(*start, *end));
            }
            Edit::RemoveLines { first, last } => {
                let _ = doc.remove_lines((*first).into(), (*last).into());
            }
            Edit::Replace { start, end, text } => {
                doc.replace(range(*start, *end), text);
            }
        }
    }

    let edited = doc.all_lines().to_vec();
    let deltas = log.take();

    let mut replay = Document::from_lines(edited.clone());
    replay.revert_deltas(&deltas);
    assert_eq!(replay.all_lines(), original.as_slice());
    replay.apply_deltas(&deltas);
    assert_eq!(replay.all_lines(), edited.as_slice());
});
