//! Section reconciliation.
//!
//! Turns a raw transcript plus optional section indexes into the
//! `Section → Paragraph → Word` tree everything else works on.
//!
//! ## Without an Index
//!
//! One section, "Complete Transcript", holding every paragraph. Paragraphs
//! without their own word list take the flat words inside their time range.
//!
//! ## With an Index
//!
//! The most recently updated index wins. Its sections are sorted by start
//! and laid end to end:
//!
//! ```text
//! declared:   [Intro @ 12s]        [Career @ 95s]
//! words:   0s ....................................... 300s
//!
//! planned: [auto 0..12) [Intro 12..95) [Career 95..300]
//!           ^ words before the first declared section get their own section
//! ```
//!
//! Each paragraph overlapping a section contributes the words that start
//! inside it, so a paragraph straddling a boundary is split between two
//! sections. Afterwards each non-empty section's times are snapped to its
//! first and last word.

use tracing::{debug, info};

use crate::payload::{RawParagraph, RawTranscript, SectionMeta, StoryIndex};
use crate::word::{most_common_speaker, Paragraph, Section, Word, UNKNOWN_SPEAKER};

/// Title of the single section used when no index applies.
pub const COMPLETE_TRANSCRIPT_TITLE: &str = "Complete Transcript";

/// Title of the section covering words before the first declared section.
pub const AUTO_SECTION_TITLE: &str = "First Section (auto-generated)";

const ZERO_TIMECODE: &str = "00:00:00";

/// A section's position on the timeline, before words are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSection {
    /// Display title.
    pub title: String,
    /// Summary text.
    pub synopsis: String,
    /// Display timestamp.
    pub timestamp: String,
    /// Start in seconds.
    pub start: f64,
    /// End in seconds.
    pub end: f64,
}

/// The most recently updated index; the first one wins a tie.
///
/// `updated_at` values are compared as strings, which orders ISO-8601
/// timestamps correctly.
#[must_use]
pub fn select_index(indexes: &[StoryIndex]) -> Option<&StoryIndex> {
    indexes.iter().fold(None, |best, index| match best {
        Some(b) if b.updated_at >= index.updated_at => Some(b),
        _ => Some(index),
    })
}

/// Lay declared sections out on the timeline.
///
/// Sections are sorted by start (stable for equal starts). If the earliest
/// word precedes the first declared start, an auto-generated section
/// `[0, first_start)` is prepended. The first section always starts at 0.
///
/// Each section ends where the next section with a strictly greater start
/// begins; the last ends at the last word's end, or its declared end when
/// there are no words.
#[must_use]
pub fn plan_sections(metas: &[SectionMeta], words: &[Word]) -> Vec<PlannedSection> {
    if metas.is_empty() {
        return vec![];
    }

    let mut sorted: Vec<&SectionMeta> = metas.iter().collect();
    sorted.sort_by(|a, b| a.start_seconds().total_cmp(&b.start_seconds()));

    let mut plan: Vec<(PlannedSection, Option<f64>)> = sorted
        .iter()
        .enumerate()
        .map(|(n, meta)| {
            let title = meta
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map_or_else(|| format!("Section {n}"), str::to_string);
            let section = PlannedSection {
                title,
                synopsis: meta.synopsis.clone().unwrap_or_default(),
                timestamp: meta.timecode.clone().unwrap_or_else(|| ZERO_TIMECODE.to_string()),
                start: meta.start_seconds(),
                end: 0.0,
            };
            (section, meta.end_seconds())
        })
        .collect();

    let first_start = plan[0].0.start;
    let earliest = words.iter().map(|w| w.start).min_by(f64::total_cmp);
    if earliest.is_some_and(|t| t < first_start) {
        info!(first_start, "adding auto-generated first section");
        let auto = PlannedSection {
            title: AUTO_SECTION_TITLE.to_string(),
            synopsis: String::new(),
            timestamp: ZERO_TIMECODE.to_string(),
            start: 0.0,
            end: 0.0,
        };
        plan.insert(0, (auto, Some(first_start)));
    }

    let last_word_end = words.last().map(|w| w.end);
    let starts: Vec<f64> = plan.iter().map(|(s, _)| s.start).collect();
    for (pos, (section, declared_end)) in plan.iter_mut().enumerate() {
        let next = starts[pos + 1..].iter().copied().find(|&s| s > section.start);
        let end = next.or(last_word_end).or(*declared_end).unwrap_or(section.start);
        section.end = end.max(section.start);
    }

    let mut plan: Vec<PlannedSection> = plan.into_iter().map(|(s, _)| s).collect();
    if let Some(first) = plan.first_mut() {
        first.start = 0.0;
    }
    plan
}

/// Builds sections from a raw transcript and its indexes.
///
/// ## Example
///
/// ```rust
/// use timeslab::{Reconciler, StoryPayload};
///
/// let payload = StoryPayload::from_json(r#"{
///     "transcript": {
///         "words": [
///             {"text": "hello", "start": 0.0, "end": 0.5},
///             {"text": "world.", "start": 0.5, "end": 1.0}
///         ],
///         "paragraphs": [{"speaker": "Ann", "start": 0.0, "end": 1.0}]
///     }
/// }"#).unwrap();
///
/// let sections = Reconciler::new().reconcile(&payload.transcript, &payload.story.indexes);
/// assert_eq!(sections.len(), 1);
/// assert_eq!(sections[0].title, "Complete Transcript");
/// assert_eq!(sections[0].speaker, "Ann");
/// assert_eq!(sections[0].paragraphs[0].words.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    floor_section_starts: bool,
}

impl Reconciler {
    /// Reconciler using exact section starts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `floor(section.start)` as the lower word bound for every section
    /// after the first. Matches data indexed by older tooling.
    #[must_use]
    pub fn with_floored_starts(mut self, floor: bool) -> Self {
        self.floor_section_starts = floor;
        self
    }

    /// Build the section tree.
    ///
    /// Every word in the output carries its section, paragraph, and word
    /// index. Malformed words are dropped.
    #[must_use]
    pub fn reconcile(&self, transcript: &RawTranscript, indexes: &[StoryIndex]) -> Vec<Section> {
        let words = transcript.words();

        let Some(index) = select_index(indexes) else {
            debug!("no section index, using a single section");
            return vec![single_section(transcript, &words)];
        };
        info!(index = %index.title, updated_at = %index.updated_at, "using most recent section index");

        let plan = plan_sections(&index.metadata, &words);
        if plan.is_empty() {
            debug!(index = %index.title, "index has no sections, using a single section");
            return vec![single_section(transcript, &words)];
        }

        let sections: Vec<Section> = plan
            .into_iter()
            .enumerate()
            .map(|(section_idx, planned)| self.fill_section(section_idx, planned, transcript, &words))
            .collect();
        info!(sections = sections.len(), "reconciled sections from index");
        sections
    }

    fn fill_section(
        &self,
        section_idx: usize,
        planned: PlannedSection,
        transcript: &RawTranscript,
        flat: &[Word],
    ) -> Section {
        debug!(section_idx, start = planned.start, end = planned.end, "section time range");

        let lower = if planned.start <= 0.0 {
            f64::NEG_INFINITY
        } else if self.floor_section_starts {
            planned.start.floor()
        } else {
            planned.start
        };

        let mut paragraphs = Vec::new();
        for raw in &transcript.paragraphs {
            let (words, para_start, para_end) = paragraph_words(raw, flat);
            if !(para_start < planned.end && para_end > planned.start) {
                continue;
            }

            let para_idx = paragraphs.len();
            let words: Vec<Word> = words
                .iter()
                .filter(|w| w.start >= lower && w.start < planned.end)
                .enumerate()
                .map(|(word_idx, w)| w.tagged(section_idx, para_idx, word_idx))
                .collect();
            if words.is_empty() {
                continue;
            }

            paragraphs.push(Paragraph {
                speaker: speaker_of(raw),
                start: para_start.max(planned.start),
                end: para_end.min(planned.end),
                words,
                ner: vec![],
            });
        }

        let mut section = Section {
            timestamp: planned.timestamp,
            title: planned.title,
            synopsis: planned.synopsis,
            speaker: UNKNOWN_SPEAKER.to_string(),
            start: planned.start,
            end: planned.end,
            paragraphs,
        };

        if let Some(speaker) = most_common_speaker(section.paragraphs.iter().map(|p| p.speaker.as_str())) {
            section.speaker = speaker;
        }
        let first = section.paragraphs.first().and_then(|p| p.words.first());
        let last = section.paragraphs.last().and_then(|p| p.words.last());
        if let (Some(first), Some(last)) = (first, last) {
            section.start = first.start;
            section.end = last.end;
        }
        section
    }
}

fn speaker_of(raw: &RawParagraph) -> String {
    raw.speaker
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SPEAKER)
        .to_string()
}

/// A paragraph's words and time bounds.
///
/// Explicit words are used when present. Otherwise the flat words starting
/// inside `[start, end]` are taken. Missing bounds default to the first and
/// last available word.
fn paragraph_words(raw: &RawParagraph, flat: &[Word]) -> (Vec<Word>, f64, f64) {
    let explicit = raw.words();
    let source: &[Word] = if explicit.is_empty() { flat } else { &explicit };

    let start = raw
        .start_seconds()
        .or_else(|| source.first().map(|w| w.start))
        .unwrap_or(0.0);
    let end = raw
        .end_seconds()
        .or_else(|| source.last().map(|w| w.end))
        .unwrap_or(0.0);

    if !explicit.is_empty() {
        return (explicit, start, end);
    }
    let words = flat
        .iter()
        .filter(|w| start <= w.start && w.start <= end)
        .cloned()
        .collect();
    (words, start, end)
}

fn single_section(transcript: &RawTranscript, flat: &[Word]) -> Section {
    let paragraphs: Vec<Paragraph> = transcript
        .paragraphs
        .iter()
        .enumerate()
        .map(|(para_idx, raw)| {
            let (words, start, end) = paragraph_words(raw, flat);
            Paragraph {
                speaker: speaker_of(raw),
                start,
                end,
                words: words
                    .iter()
                    .enumerate()
                    .map(|(word_idx, w)| w.tagged(0, para_idx, word_idx))
                    .collect(),
                ner: vec![],
            }
        })
        .collect();

    let speaker = most_common_speaker(paragraphs.iter().map(|p| p.speaker.as_str()))
        .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string());
    debug!(paragraphs = paragraphs.len(), "built single section");

    Section {
        timestamp: ZERO_TIMECODE.to_string(),
        title: COMPLETE_TRANSCRIPT_TITLE.to_string(),
        synopsis: String::new(),
        speaker,
        start: 0.0,
        end: flat.last().map_or(0.0, |w| w.end),
        paragraphs,
    }
}
