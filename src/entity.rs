//! Entity extraction and entity ↔ time mapping.
//!
//! ## Mapping
//!
//! A labeler reports entities as byte spans over text. The text is the
//! [`WordSpans`] join of the words it was built from, so the words a span
//! touches give its time range:
//!
//! ```text
//! Text:    "hello world. Next"
//! Entity:        [6..12) "world."
//! Words:   world. (0.5s - 1.0s)
//! Time:    (0.5, 1.0)
//! ```
//!
//! ## Batching
//!
//! Labeling models have token limits, so paragraphs are packed into batches
//! by estimated token count (`whitespace tokens * tokens_per_word`). A
//! paragraph that alone exceeds the limit is first cut into proportional
//! pieces. Each batch is labeled once and its entities are mapped back
//! through that batch's own spans.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::EntityLabeler;
use crate::spans::WordSpans;
use crate::word::{Section, Word};
use crate::Error;

/// An entity as reported by a labeler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Surface text.
    pub text: String,
    /// Label, one of the requested label set.
    pub label: String,
    /// Byte offset where the entity starts.
    pub start: usize,
    /// Byte offset where the entity ends (exclusive).
    pub end: usize,
    /// Model confidence, when reported.
    #[serde(default)]
    pub score: Option<f32>,
}

/// An entity placed on the transcript timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEntity {
    /// Surface text, trimmed.
    pub text: String,
    /// Label, trimmed.
    pub label: String,
    /// Start of the first covering word.
    pub start_time: f64,
    /// End of the last covering word.
    pub end_time: f64,
    /// Byte offset in the batch text.
    pub char_start: usize,
    /// Byte offset in the batch text (exclusive).
    pub char_end: usize,
    /// Section of the first covering word.
    #[serde(default)]
    pub section_idx: usize,
    /// Paragraph of the first covering word.
    #[serde(default)]
    pub para_idx: usize,
}

impl TimedEntity {
    /// Whether this entity intersects the time range `[start, end]`.
    ///
    /// True when the entity starts in `[start, end)`, ends in `(start, end]`,
    /// or strictly contains the range.
    #[must_use]
    pub fn overlaps_range(&self, start: f64, end: f64) -> bool {
        (self.start_time >= start && self.start_time < end)
            || (self.end_time > start && self.end_time <= end)
            || (self.start_time < start && self.end_time > end)
    }
}

/// Map a byte span over `spans.text()` to a time range.
///
/// Returns the first covering word's start and the last covering word's
/// end, or `None` when no word overlaps `[start, end)`.
///
/// ```rust
/// use timeslab::{map_entity_to_time, Word, WordSpans};
///
/// let words = vec![Word::new("hello", 0.0, 0.5), Word::new("world.", 0.5, 1.0)];
/// let spans = WordSpans::new(&words);
///
/// assert_eq!(map_entity_to_time(&spans, 6, 12), Some((0.5, 1.0)));
/// assert_eq!(map_entity_to_time(&spans, 0, 12), Some((0.0, 1.0)));
/// assert_eq!(map_entity_to_time(&spans, 5, 6), None);
/// ```
#[must_use]
pub fn map_entity_to_time(spans: &WordSpans<'_>, start: usize, end: usize) -> Option<(f64, f64)> {
    let words = spans.covering(start, end)?;
    Some((words.first()?.start, words.last()?.end))
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NerStats {
    /// Batches sent to the labeler or skipped as too short.
    pub batches_processed: usize,
    /// Paragraph pieces in those batches.
    pub paragraphs_processed: usize,
    /// Batches whose text was below the minimum length.
    pub skipped_too_short: usize,
    /// Batches the labeler declined.
    pub skipped_unprocessable: usize,
    /// Entities placed on the timeline.
    pub entities_found: usize,
    /// Entities no word covered.
    pub entities_unmapped: usize,
    /// Batches that failed with a labeler error.
    pub errors: usize,
}

/// A group of paragraph pieces labeled together.
#[derive(Debug, Clone)]
pub struct NerBatch<'a> {
    /// Word runs, each from a single paragraph.
    pub pieces: Vec<&'a [Word]>,
    /// Estimated tokens across all pieces.
    pub estimated_tokens: f64,
}

impl<'a> NerBatch<'a> {
    /// Span map over every word of the batch, in order.
    #[must_use]
    pub fn spans(&self) -> WordSpans<'a> {
        WordSpans::new(self.pieces.iter().copied().flat_map(<[Word]>::iter))
    }
}

/// Packs paragraphs into token-bounded batches.
#[derive(Debug, Clone, Copy)]
pub struct NerBatcher {
    token_limit: usize,
    tokens_per_word: f64,
}

impl Default for NerBatcher {
    fn default() -> Self {
        Self::new(300, 1.3)
    }
}

impl NerBatcher {
    /// Create a batcher. A zero limit is raised to 1; a non-positive
    /// tokens-per-word ratio falls back to 1.
    #[must_use]
    pub fn new(token_limit: usize, tokens_per_word: f64) -> Self {
        let tokens_per_word = if tokens_per_word.is_finite() && tokens_per_word > 0.0 {
            tokens_per_word
        } else {
            1.0
        };
        Self {
            token_limit: token_limit.max(1),
            tokens_per_word,
        }
    }

    /// Estimated model tokens in `text`.
    #[must_use]
    pub fn estimate_tokens(&self, text: &str) -> f64 {
        text.split_whitespace().count() as f64 * self.tokens_per_word
    }

    fn estimate_words(&self, words: &[Word]) -> f64 {
        words
            .iter()
            .map(|w| w.text.split_whitespace().count())
            .sum::<usize>() as f64
            * self.tokens_per_word
    }

    /// Cut an over-limit paragraph into proportional pieces.
    ///
    /// Piece size is `len * limit / estimate`, at least one word.
    #[must_use]
    pub fn split_paragraph<'a>(&self, words: &'a [Word]) -> Vec<&'a [Word]> {
        let limit = self.token_limit as f64;
        let estimate = self.estimate_words(words);
        if estimate <= limit {
            return vec![words];
        }
        let size = ((words.len() as f64 * limit / estimate) as usize).max(1);
        words.chunks(size).collect()
    }

    /// Batch every non-empty paragraph of `sections`, in order.
    #[must_use]
    pub fn batches<'a>(&self, sections: &'a [Section]) -> Vec<NerBatch<'a>> {
        let limit = self.token_limit as f64;
        let mut batches = Vec::new();
        let mut current = NerBatch {
            pieces: vec![],
            estimated_tokens: 0.0,
        };

        let pieces = sections
            .iter()
            .flat_map(|s| &s.paragraphs)
            .filter(|p| !p.words.is_empty())
            .flat_map(|p| self.split_paragraph(&p.words));

        for piece in pieces {
            let tokens = self.estimate_words(piece);
            if !current.pieces.is_empty() && current.estimated_tokens + tokens > limit {
                batches.push(std::mem::replace(
                    &mut current,
                    NerBatch {
                        pieces: vec![],
                        estimated_tokens: 0.0,
                    },
                ));
            }
            current.pieces.push(piece);
            current.estimated_tokens += tokens;
        }

        if !current.pieces.is_empty() {
            batches.push(current);
        }
        batches
    }
}

/// Runs a labeler over reconciled sections.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use timeslab::{Entity, EntityExtractor, EntityLabeler, Result, Section, Paragraph, Word};
///
/// struct Names;
///
/// impl EntityLabeler for Names {
///     fn label(&self, text: &str, _labels: &[String], _threshold: f32) -> Result<Vec<Entity>> {
///         Ok(text.match_indices("Ada").map(|(i, m)| Entity {
///             text: m.to_string(),
///             label: "person".to_string(),
///             start: i,
///             end: i + m.len(),
///             score: None,
///         }).collect())
///     }
/// }
///
/// let words = vec![Word::new("ask", 0.0, 0.4), Word::new("Ada", 0.5, 0.9)];
/// let sections = vec![Section {
///     timestamp: "00:00:00".into(),
///     title: "t".into(),
///     synopsis: String::new(),
///     speaker: "A".into(),
///     start: 0.0,
///     end: 0.9,
///     paragraphs: vec![Paragraph { speaker: "A".into(), start: 0.0, end: 0.9, words, ner: vec![] }],
/// }];
///
/// let extractor = EntityExtractor::new(Arc::new(Names), vec!["person".into()]).with_min_text_length(1);
/// let (entities, stats) = extractor.extract(&sections);
/// assert_eq!(entities.len(), 1);
/// assert_eq!((entities[0].start_time, entities[0].end_time), (0.5, 0.9));
/// assert_eq!(stats.entities_found, 1);
/// ```
#[derive(Clone)]
pub struct EntityExtractor {
    labeler: Arc<dyn EntityLabeler>,
    labels: Vec<String>,
    threshold: f32,
    min_text_length: usize,
    batcher: NerBatcher,
}

impl EntityExtractor {
    /// Extractor with threshold 0.3, minimum text length 50, and the
    /// default batcher.
    #[must_use]
    pub fn new(labeler: Arc<dyn EntityLabeler>, labels: Vec<String>) -> Self {
        Self {
            labeler,
            labels,
            threshold: 0.3,
            min_text_length: 50,
            batcher: NerBatcher::default(),
        }
    }

    /// Set the labeler confidence threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Skip batches whose trimmed text has fewer characters than this.
    #[must_use]
    pub fn with_min_text_length(mut self, min_text_length: usize) -> Self {
        self.min_text_length = min_text_length;
        self
    }

    /// Use a different batcher.
    #[must_use]
    pub fn with_batcher(mut self, batcher: NerBatcher) -> Self {
        self.batcher = batcher;
        self
    }

    /// Label every paragraph and place the entities on the timeline.
    ///
    /// Labeler failures do not abort the run: declined batches are counted
    /// as skipped, other errors are logged and counted.
    #[must_use]
    pub fn extract(&self, sections: &[Section]) -> (Vec<TimedEntity>, NerStats) {
        let mut entities = Vec::new();
        let mut stats = NerStats::default();
        let batches = self.batcher.batches(sections);
        debug!(batches = batches.len(), "running entity extraction");

        for (n, batch) in batches.iter().enumerate() {
            let spans = batch.spans();
            let text = spans.text();

            if text.trim().chars().count() < self.min_text_length {
                stats.batches_processed += 1;
                stats.paragraphs_processed += batch.pieces.len();
                stats.skipped_too_short += 1;
                continue;
            }

            debug!(
                batch = n,
                pieces = batch.pieces.len(),
                tokens = batch.estimated_tokens,
                "labeling batch"
            );
            let found = match self.labeler.label(text, &self.labels, self.threshold) {
                Ok(found) => found,
                Err(Error::Unprocessable(reason)) => {
                    debug!(batch = n, %reason, "labeler declined batch");
                    stats.batches_processed += 1;
                    stats.paragraphs_processed += batch.pieces.len();
                    stats.skipped_unprocessable += 1;
                    continue;
                }
                Err(err) => {
                    warn!(batch = n, error = %err, "entity labeling failed");
                    stats.errors += 1;
                    continue;
                }
            };
            stats.batches_processed += 1;
            stats.paragraphs_processed += batch.pieces.len();

            for entity in found {
                let label = entity.label.trim();
                let surface = entity.text.trim();
                if label.is_empty() || surface.is_empty() {
                    continue;
                }
                let Some(covered) = spans.covering(entity.start, entity.end) else {
                    stats.entities_unmapped += 1;
                    continue;
                };
                let (Some(first), Some(last)) = (covered.first(), covered.last()) else {
                    stats.entities_unmapped += 1;
                    continue;
                };
                entities.push(TimedEntity {
                    text: surface.to_string(),
                    label: label.to_string(),
                    start_time: first.start,
                    end_time: last.end,
                    char_start: entity.start,
                    char_end: entity.end,
                    section_idx: first.section_idx,
                    para_idx: first.para_idx,
                });
                stats.entities_found += 1;
            }
        }

        info!(
            entities = stats.entities_found,
            batches = stats.batches_processed,
            errors = stats.errors,
            "entity extraction finished"
        );
        (entities, stats)
    }
}

impl std::fmt::Debug for EntityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityExtractor")
            .field("labels", &self.labels)
            .field("threshold", &self.threshold)
            .field("min_text_length", &self.min_text_length)
            .field("batcher", &self.batcher)
            .finish_non_exhaustive()
    }
}

/// Append each entity to the `ner` list of the paragraph it came from.
pub fn attach_entities(sections: &mut [Section], entities: &[TimedEntity]) {
    for entity in entities {
        if let Some(para) = sections
            .get_mut(entity.section_idx)
            .and_then(|s| s.paragraphs.get_mut(entity.para_idx))
        {
            para.ner.push(entity.clone());
        }
    }
}

/// Distinct labels, in first-seen order.
#[must_use]
pub fn distinct_labels(entities: &[TimedEntity]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for entity in entities {
        if !labels.contains(&entity.label) {
            labels.push(entity.label.clone());
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::Paragraph;
    use crate::Result;
    use std::sync::Mutex;

    fn section(paragraphs: Vec<Vec<&str>>) -> Section {
        let mut t = 0.0;
        let paragraphs = paragraphs
            .into_iter()
            .enumerate()
            .map(|(para_idx, texts)| {
                let words: Vec<Word> = texts
                    .iter()
                    .enumerate()
                    .map(|(word_idx, text)| {
                        let w = Word::new(*text, t, t + 0.5).tagged(0, para_idx, word_idx);
                        t += 1.0;
                        w
                    })
                    .collect();
                Paragraph {
                    speaker: "A".into(),
                    start: words.first().map_or(0.0, |w| w.start),
                    end: words.last().map_or(0.0, |w| w.end),
                    words,
                    ner: vec![],
                }
            })
            .collect();
        Section {
            timestamp: "00:00:00".into(),
            title: "s".into(),
            synopsis: String::new(),
            speaker: "A".into(),
            start: 0.0,
            end: t,
            paragraphs,
        }
    }

    /// Labels every occurrence of each needle; records the texts it saw.
    struct Needles {
        needles: Vec<(&'static str, &'static str)>,
        seen: Mutex<Vec<String>>,
    }

    impl Needles {
        fn new(needles: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                needles,
                seen: Mutex::new(vec![]),
            }
        }
    }

    impl EntityLabeler for Needles {
        fn label(&self, text: &str, _labels: &[String], _threshold: f32) -> Result<Vec<Entity>> {
            self.seen.lock().unwrap().push(text.to_string());
            let mut out = Vec::new();
            for (needle, label) in &self.needles {
                for (i, m) in text.match_indices(needle) {
                    out.push(Entity {
                        text: m.to_string(),
                        label: (*label).to_string(),
                        start: i,
                        end: i + m.len(),
                        score: Some(0.9),
                    });
                }
            }
            Ok(out)
        }
    }

    struct Failing(fn() -> Error);

    impl EntityLabeler for Failing {
        fn label(&self, _text: &str, _labels: &[String], _threshold: f32) -> Result<Vec<Entity>> {
            Err((self.0)())
        }
    }

    fn extractor(labeler: Arc<dyn EntityLabeler>) -> EntityExtractor {
        EntityExtractor::new(labeler, vec!["person".into()]).with_min_text_length(1)
    }

    #[test]
    fn test_overlaps_range() {
        let e = |s: f64, t: f64| TimedEntity {
            text: "x".into(),
            label: "l".into(),
            start_time: s,
            end_time: t,
            char_start: 0,
            char_end: 1,
            section_idx: 0,
            para_idx: 0,
        };
        assert!(e(1.0, 2.0).overlaps_range(0.0, 5.0));
        assert!(e(0.0, 1.0).overlaps_range(0.5, 5.0));
        assert!(e(0.0, 10.0).overlaps_range(2.0, 3.0));
        assert!(e(4.0, 6.0).overlaps_range(0.0, 5.0));
        assert!(!e(5.0, 6.0).overlaps_range(0.0, 5.0));
        assert!(!e(0.0, 1.0).overlaps_range(1.0, 2.0));
    }

    #[test]
    fn test_split_paragraph_proportionally() {
        let batcher = NerBatcher::new(10, 1.0);
        let words: Vec<Word> = (0..25).map(|k| Word::new("w", k as f64, k as f64 + 0.5)).collect();
        let pieces = batcher.split_paragraph(&words);
        assert_eq!(pieces.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![10, 10, 5]);

        let short = &words[..10];
        assert_eq!(batcher.split_paragraph(short).len(), 1);
    }

    #[test]
    fn test_batches_respect_limit() {
        let sections = vec![section(vec![
            vec!["a", "b", "c"],
            vec!["d", "e"],
            vec![],
            vec!["f", "g", "h", "i"],
        ])];
        let batcher = NerBatcher::new(5, 1.0);
        let batches = batcher.batches(&sections);
        let sizes: Vec<usize> = batches.iter().map(|b| b.pieces.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert!(batches.iter().all(|b| b.estimated_tokens <= 5.0));
        assert_eq!(batches[0].spans().text(), "a b c d e");
    }

    #[test]
    fn test_extract_maps_and_tags() {
        let sections = vec![section(vec![vec!["we", "met"], vec!["Ada", "Lovelace", "there."]])];
        let labeler = Arc::new(Needles::new(vec![("Ada Lovelace", "person")]));
        let (entities, stats) = extractor(labeler).extract(&sections);

        assert_eq!(entities.len(), 1);
        let ada = &entities[0];
        assert_eq!(ada.text, "Ada Lovelace");
        assert_eq!((ada.start_time, ada.end_time), (2.0, 3.5));
        assert_eq!((ada.section_idx, ada.para_idx), (0, 1));
        assert_eq!(stats.entities_found, 1);
        assert_eq!(stats.batches_processed, 1);
        assert_eq!(stats.paragraphs_processed, 2);
    }

    #[test]
    fn test_unmapped_entities_are_counted() {
        struct OutOfRange;
        impl EntityLabeler for OutOfRange {
            fn label(&self, text: &str, _: &[String], _: f32) -> Result<Vec<Entity>> {
                Ok(vec![Entity {
                    text: "ghost".into(),
                    label: "person".into(),
                    start: text.len() + 5,
                    end: text.len() + 10,
                    score: None,
                }])
            }
        }
        let sections = vec![section(vec![vec!["hello"]])];
        let (entities, stats) = extractor(Arc::new(OutOfRange)).extract(&sections);
        assert!(entities.is_empty());
        assert_eq!(stats.entities_unmapped, 1);
    }

    #[test]
    fn test_short_text_skips_labeler() {
        let sections = vec![section(vec![vec!["hi"]])];
        let labeler = Arc::new(Needles::new(vec![]));
        let extractor = EntityExtractor::new(labeler.clone(), vec![]).with_min_text_length(50);
        let (_, stats) = extractor.extract(&sections);
        assert_eq!(stats.skipped_too_short, 1);
        assert_eq!(stats.batches_processed, 1);
        assert!(labeler.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_labeler_errors_do_not_abort() {
        let sections = vec![section(vec![vec!["a", "b"], vec!["c", "d"]])];
        let batcher = NerBatcher::new(2, 1.0);

        let declined = extractor(Arc::new(Failing(|| Error::Unprocessable("empty".into()))))
            .with_batcher(batcher)
            .extract(&sections)
            .1;
        assert_eq!(declined.skipped_unprocessable, 2);
        assert_eq!(declined.errors, 0);

        let failed = extractor(Arc::new(Failing(|| Error::Labeler("boom".into()))))
            .with_batcher(batcher)
            .extract(&sections)
            .1;
        assert_eq!(failed.errors, 2);
        assert_eq!(failed.batches_processed, 0);
    }

    #[test]
    fn test_attach_entities() {
        let mut sections = vec![section(vec![vec!["a"], vec!["b"]])];
        let entity = TimedEntity {
            text: "b".into(),
            label: "person".into(),
            start_time: 1.0,
            end_time: 1.5,
            char_start: 2,
            char_end: 3,
            section_idx: 0,
            para_idx: 1,
        };
        attach_entities(&mut sections, &[entity.clone()]);
        assert!(sections[0].paragraphs[0].ner.is_empty());
        assert_eq!(sections[0].paragraphs[1].ner, vec![entity]);
    }

    #[test]
    fn test_distinct_labels_keep_order() {
        let mk = |label: &str| TimedEntity {
            text: "x".into(),
            label: label.into(),
            start_time: 0.0,
            end_time: 1.0,
            char_start: 0,
            char_end: 1,
            section_idx: 0,
            para_idx: 0,
        };
        let labels = distinct_labels(&[mk("person"), mk("date"), mk("person")]);
        assert_eq!(labels, ["person", "date"]);
    }
}
