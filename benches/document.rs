//! Document editing benchmarks: edits with observers attached, index
//! conversion and undo replay.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;
use textcore::{Anchor, Delta, Document, FoldModel, Position, Range, UndoManager};

fn build_source(lines: usize) -> String {
    let line = "fn example() { let x = 42; println!(\"{x}\"); }\n";
    let mut text = String::with_capacity(lines * line.len());
    for _ in 0..lines {
        text.push_str(line);
    }
    text
}

fn bench_insert_typing(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_typing");
    for lines in [1_000usize, 10_000] {
        let source = build_source(lines);
        group.bench_with_input(BenchmarkId::new("lines", lines), &source, |b, source| {
            b.iter_batched(
                || Document::new(source),
                |mut doc| {
                    let row = doc.len() / 2;
                    for column in 0..64 {
                        doc.insert(Position::new(row, column), "a");
                    }
                    black_box(doc);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_paste_multiline(c: &mut Criterion) {
    let source = build_source(10_000);
    let paste = build_source(200);
    c.bench_function("document_paste_200_lines", |b| {
        b.iter_batched(
            || Document::new(&source),
            |mut doc| {
                doc.insert(Position::new(5_000, 10), black_box(&paste));
                black_box(doc);
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_edits_with_observers(c: &mut Criterion) {
    let source = build_source(10_000);
    c.bench_function("document_edit_with_1k_anchors_and_folds", |b| {
        b.iter_batched(
            || {
                let doc = Document::new(&source);
                let anchors: Vec<Anchor> = (0..1_000)
                    .map(|i| doc.create_anchor(i * 10, 5))
                    .collect();
                let mut folds = FoldModel::new();
                folds.attach(&doc);
                for i in 0..500 {
                    let row = i * 20 + 1;
                    let _ = folds.add_fold(&doc, "...", Range::new(row, 14, row + 5, 0));
                }
                (doc, anchors, folds)
            },
            |(mut doc, anchors, folds)| {
                for i in 0..50 {
                    doc.insert(Position::new(i * 150, 0), "// note\n");
                }
                doc.remove(Range::new(100, 0, 140, 0));
                black_box((doc, anchors, folds));
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_index_conversion(c: &mut Criterion) {
    let doc = Document::new(&build_source(10_000));
    let total = doc.position_to_index(doc.clip_position(Position::new(usize::MAX, 0)), 0);
    let mut group = c.benchmark_group("document_index_conversion");
    group.bench_function("index_to_position", |b| {
        b.iter(|| doc.index_to_position(black_box(total / 2), 0));
    });
    group.bench_function("position_to_index", |b| {
        b.iter(|| doc.position_to_index(black_box(Position::new(5_000, 12)), 0));
    });
    group.finish();
}

fn bench_undo_replay(c: &mut Criterion) {
    let source = build_source(2_000);
    c.bench_function("undo_redo_100_groups", |b| {
        b.iter_batched(
            || {
                let mut doc = Document::new(&source);
                let log = Rc::new(RefCell::new(Vec::<Delta>::new()));
                let sink = Rc::clone(&log);
                let id = doc.on_change(move |delta| sink.borrow_mut().push(delta.clone()));
                let mut undo = UndoManager::new();
                for i in 0..100 {
                    doc.insert(Position::new(i * 10, 0), "edit\n");
                    undo.execute(log.take(), false);
                }
                doc.off_change(id);
                (doc, undo)
            },
            |(mut doc, mut undo)| {
                while undo.undo(&mut doc).is_some() {}
                while undo.redo(&mut doc).is_some() {}
                black_box(doc);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_insert_typing,
    bench_paste_multiline,
    bench_edits_with_observers,
    bench_index_conversion,
    bench_undo_replay
);
criterion_main!(benches);
