//! The Slab type: a chunk of transcript words with its time span.

use crate::word::{words_to_text, Word};

/// A contiguous run of transcript words emitted as one retrievable unit.
///
/// ## Positions and Times
///
/// `start` and `end` are word positions (end exclusive) into the cleaned word
/// sequence the chunker was given, so consecutive slabs can be compared for
/// overlap. `start_time` and `end_time` are derived from the first and last
/// word:
///
/// ```rust
/// use timeslab::{Slab, Word};
///
/// let words = vec![Word::new("hello", 0.0, 0.5), Word::new("world.", 0.5, 1.0)];
/// let slab = Slab::new(words, 0, 2, 0).unwrap();
///
/// assert_eq!(slab.text, "hello world.");
/// assert_eq!(slab.start_time, 0.0);
/// assert_eq!(slab.end_time, 1.0);
/// ```
///
/// ## Overlap Handling
///
/// With overlap enabled, adjacent slabs share words:
///
/// ```text
/// Words:  w0 w1 w2 w3 w4 w5
/// Slab 0: w0 w1 w2 w3        [0..4]
/// Slab 1:       w2 w3 w4 w5  [2..6]  <- overlaps slab 0 on [2..4]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Slab {
    /// The words, in transcript order.
    pub words: Vec<Word>,
    /// Normalised text of the words.
    pub text: String,
    /// Start time of the first word, in seconds.
    pub start_time: f64,
    /// End time of the last word, in seconds.
    pub end_time: f64,
    /// Position of the first word in the chunker input.
    pub start: usize,
    /// Position one past the last word in the chunker input.
    pub end: usize,
    /// Zero-based index of this slab in the sequence.
    pub index: usize,
}

impl Slab {
    /// Create a slab from its words. Returns `None` when `words` is empty.
    #[must_use]
    pub fn new(words: Vec<Word>, start: usize, end: usize, index: usize) -> Option<Self> {
        let start_time = words.first()?.start;
        let end_time = words.last()?.end;
        Some(Self {
            text: words_to_text(&words),
            words,
            start_time,
            end_time,
            start,
            end,
            index,
        })
    }

    /// Number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the slab has no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word positions covered in the chunker input.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

impl std::fmt::Display for Slab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Slab {{ index: {}, words: {}..{}, time: {:.2}..{:.2}s }}",
            self.index, self.start, self.end, self.start_time, self.end_time
        )
    }
}

/// Build slabs from word ranges over `words`, numbering them in order.
pub(crate) fn slabs_from_ranges(
    words: &[&Word],
    ranges: impl IntoIterator<Item = std::ops::Range<usize>>,
) -> Vec<Slab> {
    let mut slabs = Vec::new();
    for range in ranges {
        let owned: Vec<Word> = words[range.clone()].iter().map(|w| (*w).clone()).collect();
        if let Some(slab) = Slab::new(owned, range.start, range.end, slabs.len()) {
            slabs.push(slab);
        }
    }
    slabs
}
