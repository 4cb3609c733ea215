//! Token cache benchmarks.

#![allow(clippy::semicolon_if_nothing_returned)]

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use textcore::{
    BackgroundTokenizer, Document, LineState, Position, Token, TokenizedLine, Tokenizer,
};

/// Splits rows on spaces and tracks block comments across rows.
struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize_line(&self, line: &str, state: &LineState) -> TokenizedLine {
        let in_comment = state.as_str() == "comment";
        let mut tokens = Vec::new();
        let mut column = 0;
        for word in line.split_inclusive(' ') {
            let kind = if in_comment { "comment" } else { "word" };
            tokens.push(Token::new(column, kind, word));
            column += word.chars().count();
        }
        let next = match (line.rfind("/*"), line.rfind("*/")) {
            (Some(open), Some(close)) if open > close => LineState::new("comment"),
            (Some(_), None) => LineState::new("comment"),
            (_, Some(_)) => LineState::default(),
            (None, None) => state.clone(),
        };
        TokenizedLine::new(tokens, next)
    }
}

const SAMPLE_LINES: [&str; 3] = [
    "fn main() { println!(\"hello\"); }",
    "/* a block comment that keeps going",
    "let x: HashMap<String, Vec<u32>> = HashMap::new();",
];

fn build_source(lines: usize) -> String {
    let mut text = String::new();
    for i in 0..lines {
        text.push_str(SAMPLE_LINES[i % SAMPLE_LINES.len()]);
        text.push('\n');
        if i % 7 == 6 {
            text.push_str("*/\n");
        }
    }
    text
}

fn bench_tokenize_line(c: &mut Criterion) {
    let tokenizer = WordTokenizer;
    let state = LineState::default();
    let mut group = c.benchmark_group("highlight_tokenize_line");
    for (idx, line) in SAMPLE_LINES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("line", idx), line, |b, input| {
            b.iter(|| tokenizer.tokenize_line(black_box(input), &state));
        });
    }
    group.finish();
}

fn bench_flush(c: &mut Criterion) {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer);
    let mut group = c.benchmark_group("highlight_flush");
    for lines in [1_000usize, 10_000] {
        let source = build_source(lines);
        group.bench_with_input(BenchmarkId::new("lines", lines), &source, |b, source| {
            b.iter_batched(
                || {
                    let doc = Document::new(source);
                    let mut tokens = BackgroundTokenizer::new(Arc::clone(&tokenizer));
                    tokens.attach(&doc);
                    (doc, tokens)
                },
                |(doc, tokens)| {
                    tokens.flush(&doc);
                    black_box((doc, tokens));
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer);
    let source = build_source(10_000);
    c.bench_function("highlight_relex_after_edit", |b| {
        b.iter_batched(
            || {
                let doc = Document::new(&source);
                let mut tokens = BackgroundTokenizer::new(Arc::clone(&tokenizer));
                tokens.attach(&doc);
                tokens.flush(&doc);
                (doc, tokens)
            },
            |(mut doc, tokens)| {
                doc.insert(Position::new(9_000, 0), "let y = 1;\nlet z = 2;\n");
                tokens.flush(&doc);
                black_box((doc, tokens));
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_visible_rows(c: &mut Criterion) {
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer);
    let doc = Document::new(&build_source(10_000));
    let mut tokens = BackgroundTokenizer::new(tokenizer);
    tokens.attach(&doc);
    c.bench_function("highlight_get_tokens_visible_rows", |b| {
        b.iter(|| {
            let mut count = 0;
            for row in 5_000..5_060 {
                count += tokens.get_tokens(&doc, row).len();
            }
            black_box(count)
        });
    });
}

criterion_group!(
    benches,
    bench_tokenize_line,
    bench_flush,
    bench_incremental_update,
    bench_visible_rows
);
criterion_main!(benches);
