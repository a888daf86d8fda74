//! Transcript building blocks: words, paragraphs, sections.
//!
//! These are the well-typed records the reconciler produces from a raw
//! payload. Everything downstream (chunkers, span mapper, pipeline) assumes
//! the invariants checked here: a word has non-empty text and finite timing
//! with `start <= end`.

use serde::{Deserialize, Serialize};

use crate::entity::TimedEntity;

/// Speaker name used when a paragraph carries none.
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// A single transcript word with its time span in seconds.
///
/// The index tags are assigned by the reconciler and identify where the word
/// sits in the reconciled section/paragraph tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// The word as transcribed, punctuation included.
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Index of the owning section.
    #[serde(default)]
    pub section_idx: usize,
    /// Index of the owning paragraph within its section.
    #[serde(default)]
    pub para_idx: usize,
    /// Index of this word within its paragraph.
    #[serde(default)]
    pub word_idx: usize,
}

impl Word {
    /// Create an untagged word.
    #[must_use]
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            section_idx: 0,
            para_idx: 0,
            word_idx: 0,
        }
    }

    /// Whether the word can take part in chunking.
    ///
    /// Requires non-empty text and finite timing with `start <= end`.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.text.is_empty() && self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }

    /// Return a copy carrying the given position tags.
    #[must_use]
    pub fn tagged(&self, section_idx: usize, para_idx: usize, word_idx: usize) -> Self {
        Self {
            section_idx,
            para_idx,
            word_idx,
            ..self.clone()
        }
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A speaker turn: an ordered run of words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Speaker label.
    pub speaker: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Words in transcript order.
    pub words: Vec<Word>,
    /// Entities whose first covering word lies in this paragraph.
    #[serde(default)]
    pub ner: Vec<TimedEntity>,
}

impl Paragraph {
    /// Normalised text of the paragraph.
    #[must_use]
    pub fn text(&self) -> String {
        words_to_text(&self.words)
    }
}

/// A top-level division of the transcript timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Display timecode, e.g. `"00:12:30"`.
    pub timestamp: String,
    /// Section title.
    pub title: String,
    /// Free-text synopsis.
    pub synopsis: String,
    /// Most frequent paragraph speaker.
    pub speaker: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Paragraphs in transcript order.
    pub paragraphs: Vec<Paragraph>,
}

impl Section {
    /// Total number of words across all paragraphs.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.words.len()).sum()
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join word texts with spaces and normalise the result.
#[must_use]
pub fn words_to_text(words: &[Word]) -> String {
    let joined = words
        .iter()
        .filter(|w| !w.text.is_empty())
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_text(&joined)
}

/// The most frequent speaker, ties going to the one seen first.
///
/// Returns `None` for an empty input.
pub fn most_common_speaker<'a, I>(speakers: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for speaker in speakers {
        match tally.iter_mut().find(|(name, _)| *name == speaker) {
            Some((_, count)) => *count += 1,
            None => tally.push((speaker, 1)),
        }
    }

    // Strict `>` keeps the first speaker to reach the maximum.
    let mut best: Option<(&str, usize)> = None;
    for (name, count) in tally {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.to_string())
}

/// Distinct paragraph speakers across sections, in first-seen order.
#[must_use]
pub fn speakers(sections: &[Section]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for para in sections.iter().flat_map(|s| &s.paragraphs) {
        if !para.speaker.is_empty() && !seen.contains(&para.speaker) {
            seen.push(para.speaker.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(Word::new("hi", 0.0, 0.5).is_well_formed());
        assert!(!Word::new("", 0.0, 0.5).is_well_formed());
        assert!(!Word::new("hi", 1.0, 0.5).is_well_formed());
        assert!(!Word::new("hi", f64::NAN, 0.5).is_well_formed());
    }

    #[test]
    fn test_words_to_text_normalizes() {
        let words = vec![
            Word::new(" hello ", 0.0, 0.5),
            Word::new("", 0.5, 0.6),
            Word::new("world.", 0.6, 1.0),
        ];
        assert_eq!(words_to_text(&words), "hello world.");
    }

    #[test]
    fn test_most_common_speaker_ties_go_first() {
        let names = ["B", "A", "A", "B", "C"];
        assert_eq!(most_common_speaker(names), Some("B".to_string()));
        assert_eq!(most_common_speaker(["A", "B", "B"]), Some("B".to_string()));
        assert_eq!(most_common_speaker(std::iter::empty()), None);
    }

    #[test]
    fn test_tagged_keeps_timing() {
        let w = Word::new("x", 1.0, 2.0).tagged(3, 4, 5);
        assert_eq!((w.section_idx, w.para_idx, w.word_idx), (3, 4, 5));
        assert!((w.duration() - 1.0).abs() < f64::EPSILON);
    }
}
