//! Sentence segmentation over word lists.
//!
//! ## The Hard Part: Words vs Sentences
//!
//! Sentence detectors see text; chunkers need word ranges. We join the words
//! with [`WordSpans`], segment the text, and assign each word to the sentence
//! its first byte falls in:
//!
//! ```text
//! Text:      "hello world. Next sentence"
//! Sentences: [0..12) [13..26)
//! Words:     hello(0) world.(6) | Next(13) sentence(18)
//! Result:    [0..2] [2..4]
//! ```
//!
//! Detectors round their boundaries in different ways (trailing whitespace,
//! dropped punctuation). Words no sentence claims are kept with the sentence
//! before them, so the output always partitions the input.

use std::ops::Range;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::model::SentenceSegmenter;
use crate::spans::WordSpans;
use crate::word::Word;

/// Rule-based segmenter using Unicode sentence boundaries (UAX #29).
///
/// Handles decimals and most punctuation well. Abbreviations such as "Dr."
/// may still split; plug in a model-backed [`SentenceSegmenter`] when that
/// matters.
///
/// ```rust
/// use timeslab::{SentenceSegmenter, UnicodeSentenceSegmenter};
///
/// let text = "Hello world. How are you?";
/// let spans = UnicodeSentenceSegmenter.segment(text);
/// assert_eq!(spans.len(), 2);
/// assert_eq!(&text[spans[0].clone()], "Hello world.");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSentenceSegmenter;

impl SentenceSegmenter for UnicodeSentenceSegmenter {
    fn segment(&self, text: &str) -> Vec<Range<usize>> {
        text.split_sentence_bound_indices()
            .filter_map(|(offset, sentence)| {
                let leading = sentence.len() - sentence.trim_start().len();
                let trimmed = sentence.trim_end().len();
                (trimmed > leading).then(|| offset + leading..offset + trimmed)
            })
            .collect()
    }
}

/// Group `words` into sentences, returned as ranges of word positions.
///
/// The ranges are contiguous, in order, and cover every input word. Empty
/// input yields no sentences; text the segmenter finds no sentence in yields
/// a single sentence.
pub fn sentence_ranges(words: &[&Word], segmenter: &dyn SentenceSegmenter) -> Vec<Range<usize>> {
    if words.is_empty() {
        return vec![];
    }

    let spans = WordSpans::new(words.iter().copied());
    let word_spans = spans.spans();
    let sentences = segmenter.segment(spans.text());

    // Position of the first word of each sentence.
    let mut starts: Vec<usize> = Vec::with_capacity(sentences.len());
    let mut cursor = 0;
    for sentence in &sentences {
        while cursor < word_spans.len() && word_spans[cursor].start < sentence.start {
            cursor += 1;
        }
        let Some(span) = word_spans.get(cursor) else {
            break;
        };
        if span.start < sentence.end && starts.last().map_or(true, |&last| span.index > last) {
            starts.push(span.index);
        }
    }

    if starts.is_empty() {
        debug!(words = words.len(), "segmenter found no sentences, treating input as one");
        return vec![0..words.len()];
    }

    // Leading unclaimed words join the first sentence.
    starts[0] = 0;

    let mut ranges: Vec<Range<usize>> = starts.windows(2).map(|w| w[0]..w[1]).collect();
    if let Some(&last) = starts.last() {
        ranges.push(last..words.len());
    }
    ranges
}
