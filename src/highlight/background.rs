//! Incremental per-row token cache, re-lexed in time-boxed batches.
//!
//! Each row caches its tokens and the lexer state at its end. An edit only
//! drops the rows it touched; the background pass then walks forward from
//! the first stale row, and a row whose end state changed invalidates the
//! row below it so the new state propagates as far as it matters.
//!
//! Background work is cooperative. Edits schedule a pass after a settle
//! delay; the host calls [`BackgroundTokenizer::poll`] from its event loop
//! and the pass yields after a bounded amount of work.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::schedule::{Clock, SystemClock, TaskSlot};
use super::token::Token;
use super::tokenizer::{LineState, TokenizedLine, Tokenizer};
use crate::event::{Emitter, ListenerId, Subscription};
use crate::text::{Delta, Document};

/// Timing of the background pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenizerOptions {
    /// Wait after an edit before lexing in the background.
    pub settle_delay: Duration,
    /// Pause between two batches of one pass.
    pub yield_delay: Duration,
    /// Work allowed per batch.
    pub time_budget: Duration,
    /// Rows lexed between two looks at the clock.
    pub rows_per_check: usize,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(700),
            yield_delay: Duration::from_millis(20),
            time_budget: Duration::from_millis(20),
            rows_per_check: 5,
        }
    }
}

impl TokenizerOptions {
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_yield_delay(mut self, delay: Duration) -> Self {
        self.yield_delay = delay;
        self
    }

    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    #[must_use]
    pub fn with_rows_per_check(mut self, rows: usize) -> Self {
        self.rows_per_check = rows.max(1);
        self
    }
}

/// Rows re-lexed by one background batch, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenizerUpdate {
    pub first: usize,
    pub last: usize,
}

struct Cache {
    tokenizer: Arc<dyn Tokenizer>,
    lines: Vec<Option<Vec<Token>>>,
    states: Vec<Option<LineState>>,
    current_line: usize,
    task: TaskSlot,
    options: TokenizerOptions,
}

impl Cache {
    fn clear(&mut self) {
        self.lines.clear();
        self.states.clear();
    }

    fn is_cached(&self, row: usize) -> bool {
        matches!(self.lines.get(row), Some(Some(_)))
    }

    fn tokenize_row(&mut self, doc: &Document, row: usize) -> Vec<Token> {
        let start = row
            .checked_sub(1)
            .and_then(|above| self.states.get(above).cloned().flatten())
            .unwrap_or_else(|| self.tokenizer.start_state());
        let TokenizedLine { tokens, state } = self.tokenizer.tokenize_line(doc.line(row), &start);
        trace!(row, state = %state, tokens = tokens.len(), "row tokenized");

        if self.states.get(row).and_then(Option::as_ref) != Some(&state) {
            put(&mut self.states, row, Some(state));
            put(&mut self.lines, row + 1, None);
            if self.current_line > row + 1 {
                self.current_line = row + 1;
            }
        } else if self.current_line == row {
            self.current_line = row + 1;
        }
        put(&mut self.lines, row, Some(tokens.clone()));
        tokens
    }

    fn on_delta(&mut self, delta: &Delta) {
        let range = delta.range();
        let start_row = range.start.row;
        let len = range.end.row - start_row;
        if len == 0 {
            put(&mut self.lines, start_row, None);
        } else if delta.action().is_remove() {
            splice_stale(&mut self.lines, start_row, len + 1, 1);
            splice_stale(&mut self.states, start_row, len + 1, 1);
        } else {
            splice_stale(&mut self.lines, start_row, 1, len + 1);
            splice_stale(&mut self.states, start_row, 1, len + 1);
        }
        self.current_line = self.current_line.min(start_row);
    }
}

fn put<T>(slots: &mut Vec<Option<T>>, row: usize, value: Option<T>) {
    if row >= slots.len() {
        if value.is_none() {
            return;
        }
        slots.resize_with(row + 1, || None);
    }
    slots[row] = value;
}

// Replace `remove` slots at `at` with `insert` empty ones.
fn splice_stale<T>(slots: &mut Vec<Option<T>>, at: usize, remove: usize, insert: usize) {
    if at >= slots.len() {
        return;
    }
    let end = (at + remove).min(slots.len());
    slots.splice(at..end, std::iter::repeat_with(|| None).take(insert));
}

struct Shared {
    cache: RefCell<Cache>,
    clock: Arc<dyn Clock>,
    updates: Emitter<TokenizerUpdate>,
}

impl Shared {
    fn after(&self, delay: Duration) -> Instant {
        self.clock.now() + delay
    }

    fn on_delta(&self, delta: &Delta) {
        let mut cache = self.cache.borrow_mut();
        cache.on_delta(delta);
        let deadline = self.after(cache.options.settle_delay);
        cache.task.schedule(deadline);
    }

    // One pass from the first stale row. Time-boxed passes reschedule
    // themselves when they run out of budget.
    fn run(&self, doc: &Document, time_boxed: bool) {
        let started = self.clock.now();
        let update = {
            let mut cache = self.cache.borrow_mut();
            let options = cache.options;
            let rows_per_check = options.rows_per_check.max(1);
            let len = doc.len();

            let mut current = cache.current_line;
            while cache.is_cached(current) {
                current += 1;
            }
            let first = current;
            let mut last = None;
            let mut processed = 0;
            while current < len {
                cache.tokenize_row(doc, current);
                last = Some(current);
                current += 1;
                while cache.is_cached(current) {
                    current += 1;
                }

                processed += 1;
                if time_boxed && processed % rows_per_check == 0 {
                    let now = self.clock.now();
                    if now.duration_since(started) > options.time_budget {
                        cache.task.schedule(now + options.yield_delay);
                        break;
                    }
                }
            }
            cache.current_line = current;
            last.map(|last| TokenizerUpdate { first, last })
        };

        if let Some(update) = update {
            debug!(first = update.first, last = update.last, "tokenizer batch complete");
            self.updates.emit(&update);
        }
    }
}

/// Token cache of one document, kept current in the background.
pub struct BackgroundTokenizer {
    shared: Rc<Shared>,
    subscription: Option<Subscription<Delta>>,
}

impl BackgroundTokenizer {
    #[must_use]
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self::with_options(tokenizer, TokenizerOptions::default())
    }

    #[must_use]
    pub fn with_options(tokenizer: Arc<dyn Tokenizer>, options: TokenizerOptions) -> Self {
        Self::with_clock(tokenizer, options, Arc::new(SystemClock))
    }

    /// Build a tokenizer whose timing reads `clock`.
    #[must_use]
    pub fn with_clock(
        tokenizer: Arc<dyn Tokenizer>,
        options: TokenizerOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                cache: RefCell::new(Cache {
                    tokenizer,
                    lines: Vec::new(),
                    states: Vec::new(),
                    current_line: 0,
                    task: TaskSlot::new(),
                    options,
                }),
                clock,
                updates: Emitter::new(),
            }),
            subscription: None,
        }
    }

    #[must_use]
    pub fn options(&self) -> TokenizerOptions {
        self.shared.cache.borrow().options
    }

    /// New timing applies from the next scheduling decision on.
    pub fn set_options(&self, options: TokenizerOptions) {
        self.shared.cache.borrow_mut().options = options;
    }

    #[must_use]
    pub fn tokenizer(&self) -> Arc<dyn Tokenizer> {
        Arc::clone(&self.shared.cache.borrow().tokenizer)
    }

    /// Swap the lexer. Everything is re-lexed, starting from row 0.
    pub fn set_tokenizer(&self, doc: &Document, tokenizer: Arc<dyn Tokenizer>) {
        {
            let mut cache = self.shared.cache.borrow_mut();
            cache.tokenizer = tokenizer;
            cache.clear();
        }
        self.start(doc, 0);
    }

    /// Invalidate the cache on every edit of `doc`.
    pub fn attach(&mut self, doc: &Document) {
        if self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.is_on(doc.changes()))
        {
            return;
        }
        let weak = Rc::downgrade(&self.shared);
        let id = doc.changes().on_while(move |delta| {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            shared.on_delta(delta);
            true
        });
        self.subscription = Some(Subscription::new(doc.changes(), id));
    }

    pub fn detach(&mut self) {
        self.subscription = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_live)
    }

    /// Switch to `doc`: drop the cache and any pending pass.
    pub fn set_document(&mut self, doc: &Document) {
        self.attach(doc);
        let mut cache = self.shared.cache.borrow_mut();
        cache.clear();
        cache.current_line = 0;
        cache.task.cancel();
    }

    /// Drop cached rows from `row` on and schedule a pass from there.
    pub fn start(&self, doc: &Document, row: usize) {
        let mut cache = self.shared.cache.borrow_mut();
        let current = row.min(cache.current_line).min(doc.len());
        cache.current_line = current;
        cache.lines.truncate(current);
        cache.states.truncate(current);
        let deadline = self.shared.after(cache.options.settle_delay);
        cache.task.schedule(deadline);
    }

    /// Schedule a pass unless one is already pending.
    pub fn schedule_start(&self) {
        let mut cache = self.shared.cache.borrow_mut();
        let deadline = self.shared.after(cache.options.settle_delay);
        cache.task.schedule_if_idle(deadline);
    }

    /// Cancel the pending pass, if any.
    pub fn stop(&self) {
        self.shared.cache.borrow_mut().task.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.cache.borrow().task.is_pending()
    }

    /// When the pending pass wants to run.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shared.cache.borrow().task.deadline()
    }

    /// Run the pending batch if it is due. Returns whether a batch ran.
    pub fn poll(&self, doc: &Document) -> bool {
        let now = self.shared.clock.now();
        if !self.shared.cache.borrow_mut().task.take_due(now) {
            return false;
        }
        self.shared.run(doc, true);
        true
    }

    /// Lex every stale row now, ignoring the time budget.
    pub fn flush(&self, doc: &Document) {
        self.stop();
        self.shared.run(doc, false);
    }

    /// First row the background pass has not confirmed yet.
    #[must_use]
    pub fn current_line(&self) -> usize {
        self.shared.cache.borrow().current_line
    }

    /// Whether `row` has cached tokens.
    #[must_use]
    pub fn has_tokens(&self, row: usize) -> bool {
        self.shared.cache.borrow().is_cached(row)
    }

    /// Tokens of `row`, lexing it on a cache miss.
    #[must_use]
    pub fn get_tokens(&self, doc: &Document, row: usize) -> Vec<Token> {
        if row >= doc.len() {
            return Vec::new();
        }
        let mut cache = self.shared.cache.borrow_mut();
        if let Some(Some(tokens)) = cache.lines.get(row) {
            return tokens.clone();
        }
        cache.tokenize_row(doc, row)
    }

    /// Lexer state at the end of `row`.
    #[must_use]
    pub fn get_state(&self, doc: &Document, row: usize) -> LineState {
        let mut cache = self.shared.cache.borrow_mut();
        if cache.current_line == row && row < doc.len() {
            cache.tokenize_row(doc, row);
        }
        cache
            .states
            .get(row)
            .cloned()
            .flatten()
            .unwrap_or_else(|| cache.tokenizer.start_state())
    }

    /// Token covering `column` of `row` (the last token when `None`), with
    /// its index in the row.
    ///
    /// A column on a token boundary belongs to the token that ends there.
    #[must_use]
    pub fn token_at(
        &self,
        doc: &Document,
        row: usize,
        column: Option<usize>,
    ) -> Option<(usize, Token)> {
        let tokens = self.get_tokens(doc, row);
        let (index, end) = match column {
            None => (tokens.len().checked_sub(1)?, doc.line_len(row)),
            Some(column) => {
                let mut end = 0;
                let mut index = tokens.len();
                for (i, token) in tokens.iter().enumerate() {
                    end += token.len();
                    if end >= column {
                        index = i;
                        break;
                    }
                }
                (index, end)
            }
        };
        let mut token = tokens.get(index)?.clone();
        token.start = end.saturating_sub(token.len());
        Some((index, token))
    }

    /// Listen for completed background batches.
    pub fn on_update<F>(&self, handler: F) -> ListenerId
    where
        F: FnMut(&TokenizerUpdate) + 'static,
    {
        self.shared.updates.on(handler)
    }

    pub fn off_update(&self, id: ListenerId) -> bool {
        self.shared.updates.off(id)
    }
}

impl fmt::Debug for BackgroundTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.shared.cache.borrow();
        f.debug_struct("BackgroundTokenizer")
            .field("cached_rows", &cache.lines.iter().flatten().count())
            .field("current_line", &cache.current_line)
            .field("running", &cache.task.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::ManualClock;
    use crate::text::Position;
    use std::cell::RefCell;
    use std::sync::Once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup_test_logging() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .with_test_writer()
                .try_init();
        });
    }

    /// Block-comment lexer that counts its calls and can charge time per row.
    struct CommentTokenizer {
        calls: AtomicUsize,
        clock: Option<Arc<ManualClock>>,
    }

    impl CommentTokenizer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                clock: None,
            })
        }

        fn slow(clock: Arc<ManualClock>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                clock: Some(clock),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Tokenizer for CommentTokenizer {
        fn tokenize_line(&self, line: &str, state: &LineState) -> TokenizedLine {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(clock) = &self.clock {
                clock.advance(Duration::from_millis(10));
            }
            let in_comment = state.as_str() == "comment";
            let kind = if in_comment || line.starts_with("/*") {
                "comment"
            } else {
                "text"
            };
            let opens = line.rfind("/*");
            let closes = line.rfind("*/");
            let next = match (opens, closes) {
                (Some(open), Some(close)) if open > close => "comment",
                (Some(_), None) => "comment",
                (_, Some(_)) => "start",
                (None, None) => state.as_str(),
            };
            let tokens = if line.is_empty() {
                Vec::new()
            } else {
                vec![Token::new(0, kind, line)]
            };
            TokenizedLine::new(tokens, LineState::from(next))
        }
    }

    fn setup(
        text: &str,
        lexer: Arc<CommentTokenizer>,
    ) -> (Document, BackgroundTokenizer, Arc<ManualClock>) {
        setup_test_logging();
        let clock = Arc::new(ManualClock::new());
        let doc = Document::new(text);
        let mut bg = BackgroundTokenizer::with_clock(
            lexer,
            TokenizerOptions::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        bg.set_document(&doc);
        (doc, bg, clock)
    }

    #[test]
    fn get_tokens_lexes_only_the_requested_row() {
        let lexer = CommentTokenizer::new();
        let (doc, bg, _) = setup("a\nb\nc\nd", Arc::clone(&lexer));
        let tokens = bg.get_tokens(&doc, 2);
        assert_eq!(tokens, [Token::new(0, "text", "c")]);
        assert_eq!(lexer.calls(), 1);
        let _ = bg.get_tokens(&doc, 2);
        assert_eq!(lexer.calls(), 1);
        assert!(bg.get_tokens(&doc, 9).is_empty());
    }

    #[test]
    fn inserted_lines_invalidate_only_affected_rows() {
        let lexer = CommentTokenizer::new();
        let text = (0..8).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let (mut doc, bg, _) = setup(&text, Arc::clone(&lexer));
        bg.flush(&doc);
        assert_eq!(lexer.calls(), 8);

        doc.insert_lines(2, vec!["x".into(), "y".into(), "z".into()]);
        assert!(bg.has_tokens(0) && bg.has_tokens(1));
        for row in 2..=5 {
            assert!(!bg.has_tokens(row), "row {row} should be stale");
        }
        assert!(bg.has_tokens(6));

        let _ = bg.get_tokens(&doc, 0);
        let _ = bg.get_tokens(&doc, 1);
        assert_eq!(lexer.calls(), 8);
        assert_eq!(bg.get_tokens(&doc, 5)[0].value, "line 2");
        assert_eq!(lexer.calls(), 9);
        assert_eq!(bg.get_tokens(&doc, 10)[0].value, "line 7");
    }

    #[test]
    fn changed_end_state_propagates_downward() {
        let lexer = CommentTokenizer::new();
        let (mut doc, bg, clock) = setup("a\nb\nc\nd", Arc::clone(&lexer));
        bg.flush(&doc);
        assert_eq!(lexer.calls(), 4);

        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&updates);
        bg.on_update(move |update| sink.borrow_mut().push(*update));

        doc.insert(Position::new(1, 0), "/*");
        assert!(bg.is_running());
        assert!(!bg.poll(&doc));
        clock.advance(Duration::from_millis(700));
        assert!(bg.poll(&doc));

        assert_eq!(lexer.calls(), 7);
        assert_eq!(*updates.borrow(), [TokenizerUpdate { first: 1, last: 3 }]);
        assert_eq!(bg.get_tokens(&doc, 3)[0].kind, "comment");
        assert_eq!(bg.get_state(&doc, 3).as_str(), "comment");
        assert!(!bg.is_running());
    }

    #[test]
    fn unchanged_end_state_stops_propagation() {
        let lexer = CommentTokenizer::new();
        let (mut doc, bg, _) = setup("a\nb\nc\nd", Arc::clone(&lexer));
        bg.flush(&doc);
        doc.insert(Position::new(1, 1), "bb");
        bg.flush(&doc);
        assert_eq!(lexer.calls(), 5);
        assert_eq!(bg.get_tokens(&doc, 1)[0].value, "bbb");
    }

    #[test]
    fn background_pass_yields_after_budget() {
        let clock = Arc::new(ManualClock::new());
        let lexer = CommentTokenizer::slow(Arc::clone(&clock));
        let text = vec!["row"; 12].join("\n");
        let doc = Document::new(&text);
        let mut bg = BackgroundTokenizer::with_clock(
            lexer.clone(),
            TokenizerOptions::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        bg.set_document(&doc);
        bg.start(&doc, 0);

        clock.advance(Duration::from_millis(700));
        assert!(bg.poll(&doc));
        assert_eq!(lexer.calls(), 5);
        assert_eq!(bg.current_line(), 5);
        assert_eq!(
            bg.next_deadline(),
            Some(clock.now() + Duration::from_millis(20))
        );

        assert!(!bg.poll(&doc));
        clock.advance(Duration::from_millis(20));
        assert!(bg.poll(&doc));
        assert_eq!(lexer.calls(), 10);

        clock.advance(Duration::from_millis(20));
        assert!(bg.poll(&doc));
        assert_eq!(lexer.calls(), 12);
        assert!(!bg.is_running());
    }

    #[test]
    fn removals_splice_the_cache() {
        let lexer = CommentTokenizer::new();
        let (mut doc, bg, _) = setup("r0\nr1\nr2\nr3\nr4\nr5", lexer);
        bg.flush(&doc);
        doc.remove(crate::text::Range::new(1, 1, 3, 1));
        assert_eq!(doc.len(), 4);
        assert!(bg.has_tokens(0));
        assert!(!bg.has_tokens(1));
        assert!(bg.has_tokens(2) && bg.has_tokens(3));
        assert_eq!(bg.get_tokens(&doc, 2)[0].value, "r4");
        assert_eq!(bg.get_tokens(&doc, 1)[0].value, "r3");
    }

    #[test]
    fn stop_is_idempotent_and_schedule_start_keeps_pending() {
        let (doc, bg, clock) = setup("a", CommentTokenizer::new());
        bg.stop();
        bg.stop();
        assert!(!bg.is_running());

        bg.schedule_start();
        let deadline = bg.next_deadline();
        clock.advance(Duration::from_millis(100));
        bg.schedule_start();
        assert_eq!(bg.next_deadline(), deadline);

        bg.stop();
        bg.stop();
        assert!(!bg.poll(&doc));
    }

    #[test]
    fn set_tokenizer_relexes_from_the_top() {
        let first = CommentTokenizer::new();
        let (doc, bg, clock) = setup("a\nb", Arc::clone(&first));
        bg.flush(&doc);

        let second = CommentTokenizer::new();
        bg.set_tokenizer(&doc, second.clone());
        assert!(!bg.has_tokens(0));
        assert_eq!(bg.current_line(), 0);
        clock.advance(Duration::from_millis(700));
        assert!(bg.poll(&doc));
        assert_eq!(second.calls(), 2);
        assert_eq!(first.calls(), 2);
    }

    #[test]
    fn token_at_walks_token_widths() {
        struct Words;
        impl Tokenizer for Words {
            fn tokenize_line(&self, line: &str, state: &LineState) -> TokenizedLine {
                let tokens = line
                    .split_inclusive(' ')
                    .map(|word| Token::new(0, "word", word))
                    .collect();
                TokenizedLine::new(tokens, state.clone())
            }
        }
        setup_test_logging();
        let doc = Document::new("let x = 1;");
        let bg = BackgroundTokenizer::new(Arc::new(Words));

        let (index, token) = bg.token_at(&doc, 0, Some(5)).unwrap();
        assert_eq!((index, token.value.as_str(), token.start), (1, "x ", 4));
        let (index, token) = bg.token_at(&doc, 0, Some(4)).unwrap();
        assert_eq!((index, token.start), (0, 0));
        let (index, token) = bg.token_at(&doc, 0, None).unwrap();
        assert_eq!((index, token.value.as_str(), token.start), (3, "1;", 8));
        assert!(bg.token_at(&doc, 0, Some(40)).is_none());
    }

    #[test]
    fn detached_tokenizer_ignores_edits() {
        let lexer = CommentTokenizer::new();
        let (mut doc, mut bg, _) = setup("a\nb", lexer);
        bg.flush(&doc);
        bg.detach();
        assert!(!bg.is_attached());
        doc.insert(Position::new(0, 0), "zz");
        assert!(bg.has_tokens(0));
        assert!(!bg.is_running());
    }
}
