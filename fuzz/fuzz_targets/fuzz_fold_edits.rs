//! Fuzz target for fold tracking.
//!
//! Adds folds and edits the document around them. Fold lines must stay
//! ordered and disjoint, and every fold must stay inside the document.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use textcore::{Document, FoldModel, Position, Range};

#[derive(Arbitrary, Debug)]
enum Op {
    Fold { start: (u8, u8), end: (u8, u8) },
    Insert { row: u8, column: u8, text: String },
    Remove { start: (u8, u8), end: (u8, u8) },
    Unfold { row: u8 },
}

fn position((row, column): (u8, u8)) -> Position {
    Position::new(row.into(), column.into())
}

fn range(a: (u8, u8), b: (u8, u8)) -> Range {
    let (a, b) = (position(a), position(b));
    Range::from_points(a.min(b), a.max(b))
}

fuzz_target!(|input: (String, Vec<Op>)| {
    let (text, ops) = input;
    let mut doc = Document::new(&text);
    let mut folds = FoldModel::new();
    folds.attach(&doc);

    for op in ops.iter().take(64) {
        match op {
            Op::Fold { start, end } => {
                let _ = folds.add_fold(&doc, "...", range(*start, *end));
            }
            Op::Insert { row, column, text } => {
                let at = doc.clip_position(position((*row, *column)));
                doc.insert(at, text);
            }
            Op::Remove { start, end } => {
                doc.remove(range(*start, *end));
            }
            Op::Unfold { row } => {
                folds.unfold_row(&doc, (*row).into());
            }
        }

        let lines = folds.fold_lines();
        for pair in lines.windows(2) {
            assert!(pair[0].end_row() < pair[1].start_row());
        }
        for line in lines.iter() {
            assert!(line.end_row() < doc.len());
        }
    }
});
