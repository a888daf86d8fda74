//! Word ↔ text offset mapping.
//!
//! ## The Problem
//!
//! Sentence detectors and entity labelers work on plain text. Transcripts are
//! word lists with timestamps. To use one with the other we need a shared
//! coordinate system:
//!
//! ```text
//! Words:   ["hello", "", "world."]
//! Text:    "hello world."
//! Spans:   hello  -> [0..5)
//!          ""     -> (no span, no separator)
//!          world. -> [6..12)
//! ```
//!
//! Any detector span over the text can then be mapped back to the words it
//! touches, and from there to a time range.
//!
//! ## Byte Offsets
//!
//! Offsets are byte offsets into [`WordSpans::text`], matching Rust's string
//! slicing semantics. Collaborators that report character offsets must
//! convert at their boundary, with [`char_to_byte_offset`] or
//! [`WordSpans::byte_range`].

use std::ops::Range;

use crate::word::Word;

/// Byte offset of the `char_offset`-th character of `text`.
///
/// An offset equal to the character count maps to `text.len()`. Returns
/// `None` past that.
///
/// ```rust
/// use timeslab::char_to_byte_offset;
///
/// assert_eq!(char_to_byte_offset("café über", 5), Some(6));
/// assert_eq!(char_to_byte_offset("café", 4), Some(5));
/// assert_eq!(char_to_byte_offset("café", 5), None);
/// ```
#[must_use]
pub fn char_to_byte_offset(text: &str, char_offset: usize) -> Option<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(char_offset)
}

/// The text span of one word in the joined text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordSpan {
    /// Byte offset where the word starts.
    pub start: usize,
    /// Byte offset where the word ends (exclusive).
    pub end: usize,
    /// Position of the word in the input sequence.
    pub index: usize,
}

impl WordSpan {
    /// Whether this span overlaps `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.end > start && self.start < end
    }
}

/// A word sequence joined into text, with each word's offsets recorded.
///
/// ## Example
///
/// ```rust
/// use timeslab::{Word, WordSpans};
///
/// let words = vec![Word::new("hello", 0.0, 0.5), Word::new("world.", 0.5, 1.0)];
/// let spans = WordSpans::new(&words);
///
/// assert_eq!(spans.text(), "hello world.");
/// let covered = spans.covering(6, 12).unwrap();
/// assert_eq!(covered[0].text, "world.");
/// assert!(spans.covering(20, 25).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct WordSpans<'a> {
    words: Vec<&'a Word>,
    spans: Vec<WordSpan>,
    text: String,
}

impl<'a> WordSpans<'a> {
    /// Join `words` with single spaces, recording each word's span.
    ///
    /// Words with empty text get no span and consume no separator.
    pub fn new(words: impl IntoIterator<Item = &'a Word>) -> Self {
        let words: Vec<&'a Word> = words.into_iter().collect();
        let mut spans = Vec::with_capacity(words.len());
        let mut text = String::new();

        for (index, word) in words.iter().enumerate() {
            if word.text.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            let start = text.len();
            text.push_str(&word.text);
            spans.push(WordSpan {
                start,
                end: text.len(),
                index,
            });
        }

        Self { words, spans, text }
    }

    /// The joined text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Spans in increasing offset order.
    #[must_use]
    pub fn spans(&self) -> &[WordSpan] {
        &self.spans
    }

    /// The input words, including ones without a span.
    #[must_use]
    pub fn words(&self) -> &[&'a Word] {
        &self.words
    }

    /// The word a span refers to.
    #[must_use]
    pub fn word(&self, span: &WordSpan) -> &'a Word {
        self.words[span.index]
    }

    /// Positions (into [`spans`](Self::spans)) of every span overlapping `[start, end)`.
    ///
    /// One pass in offset order, stopping at the first span that starts at
    /// or after `end`. Returns `None` when nothing overlaps.
    #[must_use]
    pub fn covering_spans(&self, start: usize, end: usize) -> Option<Range<usize>> {
        let mut first = None;
        let mut last = 0;
        for (pos, span) in self.spans.iter().enumerate() {
            if span.start >= end {
                break;
            }
            if span.end <= start {
                continue;
            }
            first.get_or_insert(pos);
            last = pos;
        }
        first.map(|first| first..last + 1)
    }

    /// Every word overlapping `[start, end)`, or `None` when nothing does.
    #[must_use]
    pub fn covering(&self, start: usize, end: usize) -> Option<Vec<&'a Word>> {
        let range = self.covering_spans(start, end)?;
        Some(self.spans[range].iter().map(|s| self.word(s)).collect())
    }

    /// Convert a character range over [`text`](Self::text) to byte offsets.
    ///
    /// Returns `None` if either end lies past the text.
    #[must_use]
    pub fn byte_range(&self, chars: Range<usize>) -> Option<Range<usize>> {
        let start = char_to_byte_offset(&self.text, chars.start)?;
        let end = char_to_byte_offset(&self.text, chars.end)?;
        Some(start..end)
    }

    /// Number of words that received a span.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether no word received a span.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
