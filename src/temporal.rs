//! Temporal-hybrid chunking: time windows nudged to sentence ends.
//!
//! ## How It Works
//!
//! Each chunk starts at word `i` and takes every word that ends inside the
//! window `[start(i), start(i) + chunk_seconds]`. If that cut lands
//! mid-sentence, the chunk may grow to the next sentence end within a short
//! lookahead:
//!
//! ```text
//! chunk_seconds = 10, lookahead = 3
//!
//! time:   0 ........ 10 ... 13
//! words:  w w w w w w w w. w w
//!                    ^   ^
//!          temporal cut  sentence end within lookahead -> cut here
//! ```
//!
//! The extension is skipped when it would push the chunk past `max_words`,
//! and every chunk is hard-capped at `max_words`.
//!
//! ## Why Overlap in Seconds?
//!
//! Retrieval hits near a chunk edge lose context. With overlap, the next
//! chunk starts at the first word within `overlap_seconds` of the previous
//! chunk's end:
//!
//! ```text
//! overlap = 2s
//!
//! Chunk 0: [0.0 ............ 10.0]
//! Chunk 1:             [8.1 ............ 18.3]
//! ```
//!
//! A chunk always advances by at least one word, so chunking terminates even
//! when no word fits a window.

use std::ops::Range;

use crate::capacity::WordBudget;
use crate::slab::slabs_from_ranges;
use crate::word::Word;
use crate::{Slab, WordChunker};

/// Shortest allowed window, in seconds.
pub const MIN_CHUNK_SECONDS: f64 = 0.1;

/// Largest allowed overlap as a fraction of the window.
pub const MAX_OVERLAP_RATIO: f64 = 0.8;

/// Tokens ending in a period that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "mt.", "vs.", "etc.", "e.g.",
    "i.e.", "inc.", "ltd.", "co.", "corp.", "no.", "u.s.", "jan.", "feb.", "mar.", "apr.",
    "jun.", "jul.", "aug.", "sep.", "sept.", "oct.", "nov.", "dec.",
];

/// Whether a transcript word ends a sentence.
///
/// Trailing quotes and closing brackets are ignored, so `done."` and
/// `(really?)` count. Known abbreviations such as `Dr.` do not.
///
/// ```rust
/// use timeslab::is_sentence_end;
///
/// assert!(is_sentence_end("world."));
/// assert!(is_sentence_end("right?\""));
/// assert!(is_sentence_end("well…"));
/// assert!(!is_sentence_end("Dr."));
/// assert!(!is_sentence_end("and"));
/// ```
#[must_use]
pub fn is_sentence_end(text: &str) -> bool {
    let trimmed = text
        .trim_end()
        .trim_end_matches(|c: char| {
            matches!(c, '"' | '\'' | '\u{201d}' | '\u{2019}' | ')' | ']' | '}' | '\u{bb}')
        });

    let Some(last) = trimmed.chars().next_back() else {
        return false;
    };
    if !matches!(last, '.' | '!' | '?' | ';' | '\u{2026}') {
        return false;
    }

    let lower = trimmed.to_lowercase();
    !ABBREVIATIONS.contains(&lower.as_str())
}

/// Time-window chunker with optional sentence-boundary lookahead.
///
/// ## Example
///
/// ```rust
/// use timeslab::{TemporalChunker, Word, WordChunker};
///
/// let words = vec![
///     Word::new("hello", 0.0, 0.5),
///     Word::new("world.", 0.5, 1.0),
///     Word::new("Next", 1.2, 1.5),
///     Word::new("sentence", 1.5, 2.0),
/// ];
/// let chunker = TemporalChunker::new(1.0, 0.0)
///     .with_word_bounds(1, 10)
///     .without_sentence_breaks();
/// let slabs = chunker.chunk(&words);
///
/// assert_eq!(slabs.len(), 2);
/// assert_eq!(slabs[0].text, "hello world.");
/// assert_eq!(slabs[1].text, "Next sentence");
/// ```
#[derive(Debug, Clone)]
pub struct TemporalChunker {
    chunk_seconds: f64,
    overlap_seconds: f64,
    budget: WordBudget,
    prefer_sentence_breaks: bool,
    lookahead_seconds: f64,
}

impl TemporalChunker {
    /// Create a chunker with the given window and overlap.
    ///
    /// `chunk_seconds` is clamped to at least [`MIN_CHUNK_SECONDS`];
    /// `overlap_seconds` to `[0, 0.8 * chunk_seconds]`. Word bounds default
    /// to 10..=200 and sentence breaks are preferred with a 3 s lookahead.
    #[must_use]
    pub fn new(chunk_seconds: f64, overlap_seconds: f64) -> Self {
        let chunk_seconds = if chunk_seconds.is_finite() {
            chunk_seconds.max(MIN_CHUNK_SECONDS)
        } else {
            MIN_CHUNK_SECONDS
        };
        let overlap_seconds = if overlap_seconds.is_finite() {
            overlap_seconds.clamp(0.0, MAX_OVERLAP_RATIO * chunk_seconds)
        } else {
            0.0
        };
        Self {
            chunk_seconds,
            overlap_seconds,
            budget: WordBudget::default(),
            prefer_sentence_breaks: true,
            lookahead_seconds: 3.0,
        }
    }

    /// Set the minimum and maximum words per chunk.
    ///
    /// # Panics
    ///
    /// Panics if `max_words == 0`.
    #[must_use]
    pub fn with_word_bounds(mut self, min_words: usize, max_words: usize) -> Self {
        assert!(max_words > 0, "max_words must be > 0");
        self.budget = WordBudget::from(min_words..=max_words);
        self
    }

    /// Extend chunks to a sentence end found within `lookahead_seconds`
    /// past the window.
    #[must_use]
    pub fn with_sentence_breaks(mut self, lookahead_seconds: f64) -> Self {
        self.prefer_sentence_breaks = true;
        self.lookahead_seconds = if lookahead_seconds.is_finite() {
            lookahead_seconds.max(0.0)
        } else {
            0.0
        };
        self
    }

    /// Cut purely on time.
    #[must_use]
    pub fn without_sentence_breaks(mut self) -> Self {
        self.prefer_sentence_breaks = false;
        self
    }

    /// Window length in seconds, after clamping.
    #[must_use]
    pub fn chunk_seconds(&self) -> f64 {
        self.chunk_seconds
    }

    /// Overlap in seconds, after clamping.
    #[must_use]
    pub fn overlap_seconds(&self) -> f64 {
        self.overlap_seconds
    }

    /// The word bounds in use.
    #[must_use]
    pub fn budget(&self) -> WordBudget {
        self.budget
    }

    /// End (exclusive) of the chunk starting at `i`.
    fn chunk_end(&self, words: &[&Word], i: usize) -> usize {
        let n = words.len();
        let max_words = self.budget.max();
        let window_end = words[i].start + self.chunk_seconds;

        let mut j = i;
        while j < n && words[j].end <= window_end {
            j += 1;
        }
        if j == i {
            j = i + 1;
        }

        if self.prefer_sentence_breaks && j < n {
            // Start from the last word already in the chunk: if it ends a
            // sentence the temporal cut is kept as is.
            let horizon = window_end + self.lookahead_seconds;
            let mut k = j - 1;
            while k < n && words[k].end <= horizon {
                if is_sentence_end(&words[k].text) {
                    if k + 1 - i <= max_words {
                        j = j.max(k + 1);
                    }
                    break;
                }
                k += 1;
            }
        }

        j.min(i + max_words)
    }

    /// Start of the chunk following `range`.
    fn next_start(&self, words: &[&Word], range: &Range<usize>) -> usize {
        if self.overlap_seconds <= 0.0 {
            return range.end;
        }
        let target = words[range.end - 1].end - self.overlap_seconds;
        let k = (range.start..range.end)
            .find(|&k| words[k].start >= target)
            .unwrap_or(range.end);
        k.max(range.start + 1)
    }

    /// Raw chunk ranges before undersized chunks are merged.
    fn windows(&self, words: &[&Word]) -> Vec<Range<usize>> {
        let n = words.len();
        let mut ranges = Vec::new();
        let mut i = 0;

        while i < n {
            let j = self.chunk_end(words, i);
            let range = i..j;
            if j >= n {
                ranges.push(range);
                break;
            }
            i = self.next_start(words, &range);
            ranges.push(range);
        }

        ranges
    }

    /// Merge each undersized chunk into the one emitted before it.
    ///
    /// When the merge would pass `max_words`, the undersized chunk instead
    /// starts earlier, reusing the predecessor's last words until it holds
    /// `min_words`. Either way no word is left in an undersized chunk after
    /// the first.
    fn merge_undersized(&self, ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            if let Some(prev) = merged.last_mut() {
                if self.budget.is_undersized(range.len()) {
                    let union = prev.start..prev.end.max(range.end);
                    if union.len() <= self.budget.max() {
                        *prev = union;
                        continue;
                    }
                    // union > max >= min, so this start stays past prev.start
                    let start = range.end.saturating_sub(self.budget.min()).max(prev.start + 1);
                    merged.push(start.min(range.start)..range.end);
                    continue;
                }
            }
            merged.push(range);
        }
        merged
    }
}

impl Default for TemporalChunker {
    fn default() -> Self {
        Self::new(30.0, 8.0)
    }
}

impl WordChunker for TemporalChunker {
    fn chunk(&self, words: &[Word]) -> Vec<Slab> {
        let clean: Vec<&Word> = words.iter().filter(|w| w.is_well_formed()).collect();
        if clean.is_empty() {
            return vec![];
        }
        let ranges = self.merge_undersized(self.windows(&clean));
        slabs_from_ranges(&clean, ranges)
    }
}
