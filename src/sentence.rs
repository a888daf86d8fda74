//! Sentence-greedy chunking.
//!
//! Groups whole sentences into chunks bounded by word counts. A sentence is
//! never split.
//!
//! ## The Algorithm
//!
//! ```text
//! max_words = 6, overlap_sentences = 1
//!
//! Sentences: [a a a] [b b] [c c c] [d]
//!
//! 1. [a a a] + [b b]          = 5 words
//! 2. + [c c c] would be 8     -> close chunk 0 = [a a a b b]
//! 3. seed with last sentence  -> [b b] + [c c c] = 5 words
//! 4. + [d]                    = 6 words
//!
//! Chunk 0: a a a b b
//! Chunk 1: b b c c c d       <- [b b] repeated for context
//! ```
//!
//! Timestamps are not used for grouping; they ride along on the words and
//! give each slab its time span.
//!
//! ## Edge Cases
//!
//! - A sentence longer than `max_words` becomes its own chunk.
//! - A trailing chunk shorter than `min_words` is merged into its predecessor.
//! - Overlap seeding is skipped when the closed chunk has no more sentences
//!   than the overlap count. A seeded chunk may pass `max_words` by the
//!   repeated sentences.

use std::ops::Range;
use std::sync::Arc;

use crate::capacity::WordBudget;
use crate::model::SentenceSegmenter;
use crate::segment::{sentence_ranges, UnicodeSentenceSegmenter};
use crate::slab::slabs_from_ranges;
use crate::word::Word;
use crate::{Slab, WordChunker};

/// Sentence-greedy chunker.
///
/// ## Example
///
/// ```rust
/// use timeslab::{SentenceChunker, Word, WordChunker};
///
/// let words = vec![
///     Word::new("hello", 0.0, 0.5),
///     Word::new("world.", 0.5, 1.0),
///     Word::new("Next", 1.2, 1.5),
///     Word::new("sentence.", 1.5, 2.0),
/// ];
/// let chunker = SentenceChunker::new(1, 3);
/// let slabs = chunker.chunk(&words);
///
/// assert_eq!(slabs.len(), 2);
/// assert_eq!(slabs[0].text, "hello world.");
/// assert_eq!(slabs[1].start_time, 1.2);
/// ```
#[derive(Clone)]
pub struct SentenceChunker {
    segmenter: Arc<dyn SentenceSegmenter>,
    budget: WordBudget,
    overlap_sentences: usize,
}

impl SentenceChunker {
    /// Create a chunker with the built-in Unicode segmenter and no overlap.
    ///
    /// # Arguments
    ///
    /// * `min_words` - Soft lower bound for the trailing chunk
    /// * `max_words` - Upper bound, passed only by a single overlong sentence
    ///   or by the sentences repeated as overlap
    ///
    /// # Panics
    ///
    /// Panics if `max_words == 0`.
    #[must_use]
    pub fn new(min_words: usize, max_words: usize) -> Self {
        assert!(max_words > 0, "max_words must be > 0");
        Self {
            segmenter: Arc::new(UnicodeSentenceSegmenter),
            budget: WordBudget::from(min_words..=max_words),
            overlap_sentences: 0,
        }
    }

    /// Repeat the last `n` sentences of each chunk at the start of the next.
    #[must_use]
    pub fn with_overlap(mut self, overlap_sentences: usize) -> Self {
        self.overlap_sentences = overlap_sentences;
        self
    }

    /// Use a different sentence segmenter.
    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Arc<dyn SentenceSegmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// The word bounds in use.
    #[must_use]
    pub fn budget(&self) -> WordBudget {
        self.budget
    }

    /// Group sentences into chunks, as ranges of sentence positions.
    fn group(&self, sentences: &[Range<usize>]) -> Vec<Range<usize>> {
        let words_in = |group: &Range<usize>| -> usize {
            sentences[group.clone()].iter().map(ExactSizeIterator::len).sum()
        };

        let mut chunks: Vec<Range<usize>> = Vec::new();
        let mut current = 0..0;
        let mut current_words = 0;

        for (pos, sentence) in sentences.iter().enumerate() {
            let len = sentence.len();

            if current_words > 0 && self.budget.would_overflow(current_words, len) {
                chunks.push(current.clone());

                let overlap = self.overlap_sentences;
                if overlap > 0 && current.len() > overlap {
                    current = current.end - overlap..current.end;
                    current_words = words_in(&current);
                } else {
                    current = pos..pos;
                    current_words = 0;
                }
            }

            current.end = pos + 1;
            current_words += len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        // Merge an undersized trailing chunk into its predecessor. The
        // predecessor already holds any seeded overlap sentences, so the
        // union is taken rather than appending them twice.
        if chunks.len() > 1 {
            let last_words = chunks.last().map_or(0, &words_in);
            if self.budget.is_undersized(last_words) {
                if let Some(last) = chunks.pop() {
                    if let Some(prev) = chunks.last_mut() {
                        prev.end = prev.end.max(last.end);
                    }
                }
            }
        }

        chunks
    }
}

impl WordChunker for SentenceChunker {
    fn chunk(&self, words: &[Word]) -> Vec<Slab> {
        let clean: Vec<&Word> = words.iter().filter(|w| w.is_well_formed()).collect();
        if clean.is_empty() {
            return vec![];
        }

        let sentences = sentence_ranges(&clean, self.segmenter.as_ref());
        let groups = self.group(&sentences);

        let ranges = groups.into_iter().filter(|g| !g.is_empty()).map(|g| {
            let start = sentences[g.start].start;
            let end = sentences[g.end - 1].end;
            start..end
        });

        slabs_from_ranges(&clean, ranges)
    }
}

impl std::fmt::Debug for SentenceChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceChunker")
            .field("budget", &self.budget)
            .field("overlap_sentences", &self.overlap_sentences)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Treat every word ending in '.' as a sentence end.
    struct PeriodSegmenter;

    impl SentenceSegmenter for PeriodSegmenter {
        fn segment(&self, text: &str) -> Vec<Range<usize>> {
            let mut spans = Vec::new();
            let mut start = 0;
            for (i, c) in text.char_indices() {
                if c == '.' {
                    spans.push(start..i + 1);
                    start = i + 2;
                }
            }
            if start < text.len() {
                spans.push(start..text.len());
            }
            spans
        }
    }

    /// Build words from sentences given as word counts, e.g. [3, 2] ->
    /// "w w w. w w."
    fn sentence_words(lengths: &[usize]) -> Vec<Word> {
        let mut words = Vec::new();
        let mut t = 0.0;
        for &len in lengths {
            for i in 0..len {
                let text = if i + 1 == len { "w." } else { "w" };
                words.push(Word::new(text, t, t + 0.4));
                t += 0.5;
            }
        }
        words
    }

    fn chunker(min: usize, max: usize) -> SentenceChunker {
        SentenceChunker::new(min, max).with_segmenter(Arc::new(PeriodSegmenter))
    }

    fn lens(slabs: &[Slab]) -> Vec<usize> {
        slabs.iter().map(Slab::len).collect()
    }

    #[test]
    fn test_greedy_grouping() {
        let words = sentence_words(&[3, 2, 3, 1]);
        let slabs = chunker(1, 6).chunk(&words);
        assert_eq!(lens(&slabs), vec![5, 4]);
        assert_eq!(slabs[1].span(), 5..9);
    }

    #[test]
    fn test_overlap_repeats_last_sentence() {
        let words = sentence_words(&[3, 2, 3, 1]);
        let slabs = chunker(1, 6).with_overlap(1).chunk(&words);
        assert_eq!(lens(&slabs), vec![5, 6]);
        assert_eq!(slabs[0].span(), 0..5);
        assert_eq!(slabs[1].span(), 3..9);
    }

    #[test]
    fn test_overlap_seed_kept_past_max() {
        // Seeding "w w." onto the 5-word sentence gives 7 words, over max 6.
        let words = sentence_words(&[3, 2, 5]);
        let slabs = chunker(1, 6).with_overlap(1).chunk(&words);
        let spans: Vec<_> = slabs.iter().map(Slab::span).collect();
        assert_eq!(spans, vec![0..5, 3..10]);
    }

    #[test]
    fn test_overlap_needs_more_sentences_than_overlap() {
        // Chunk 0 holds a single sentence, so nothing is repeated.
        let words = sentence_words(&[4, 4]);
        let slabs = chunker(1, 5).with_overlap(1).chunk(&words);
        assert_eq!(slabs.iter().map(Slab::span).collect::<Vec<_>>(), vec![0..4, 4..8]);
    }

    #[test]
    fn test_overlong_sentence_is_its_own_chunk() {
        let words = sentence_words(&[2, 9, 2]);
        let slabs = chunker(1, 4).chunk(&words);
        assert_eq!(lens(&slabs), vec![2, 9, 2]);
    }

    #[test]
    fn test_small_trailing_chunk_merges() {
        let words = sentence_words(&[4, 4, 3]);
        let slabs = chunker(4, 5).chunk(&words);
        assert_eq!(lens(&slabs), vec![4, 7]);
        assert_eq!(slabs.last().map(Slab::span), Some(4..11));
    }

    #[test]
    fn test_merge_with_overlap_does_not_duplicate() {
        // [2 2] | [2 2] seeded | [2 2] seeded, last one below min
        let words = sentence_words(&[2, 2, 2, 2]);
        let slabs = chunker(5, 5).with_overlap(1).chunk(&words);
        assert_eq!(slabs.iter().map(Slab::span).collect::<Vec<_>>(), vec![0..4, 2..8]);
    }

    #[test]
    fn test_single_small_chunk_is_kept() {
        let words = sentence_words(&[1]);
        let slabs = chunker(10, 20).chunk(&words);
        assert_eq!(lens(&slabs), vec![1]);
    }

    #[test]
    fn test_malformed_words_dropped() {
        let mut words = sentence_words(&[2, 2]);
        words.insert(1, Word::new("", 0.1, 0.2));
        words.push(Word::new("bad", 5.0, 1.0));
        let slabs = chunker(1, 2).chunk(&words);
        assert_eq!(lens(&slabs), vec![2, 2]);
    }

    #[test]
    fn test_empty_words() {
        assert!(chunker(1, 10).chunk(&[]).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_zero_max_panics() {
        let _ = SentenceChunker::new(0, 0);
    }
}
