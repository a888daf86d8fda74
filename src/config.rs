//! Processing configuration.
//!
//! Defaults match the ingestion service this crate was built for. Values can
//! be loaded from JSON (missing keys keep their defaults) or overlaid from
//! environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `CHUNK_SECONDS` | `chunk_seconds` |
//! | `CHUNK_OVERLAP_SECONDS` | `overlap_seconds` |
//! | `MIN_WORDS_PER_CHUNK` | `min_words_per_chunk` |
//! | `MIN_CHARS_PER_CHUNK` | `min_chars_per_chunk` |
//! | `MAX_WORDS_PER_CHUNK` | `max_words_per_chunk` |
//! | `PREFER_SENTENCE_BREAKS` | `prefer_sentence_breaks` |
//! | `LOOKAHEAD_SECONDS` | `lookahead_seconds` |
//! | `NER_LABELS` | `ner_labels` (comma-separated) |
//! | `NER_THRESHOLD` | `ner_threshold` |
//! | `MIN_TEXT_LENGTH_FOR_NER` | `min_text_length_for_ner` |
//! | `NER_TOKEN_LIMIT` | `ner_token_limit` |
//! | `FLOOR_SECTION_STARTS` | `floor_section_starts` |
//! | `EMBEDDING_BATCH_SIZE` | `embedding_batch_size` |

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::NerBatcher;
use crate::reconcile::Reconciler;
use crate::temporal::TemporalChunker;
use crate::{Error, Result};

/// Labels requested from the entity labeler by default.
pub const DEFAULT_NER_LABELS: &[&str] = &["person", "organization", "location", "date", "event", "technology"];

/// Settings for reconciliation, chunking, and entity extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Temporal window per chunk, in seconds.
    pub chunk_seconds: f64,
    /// Overlap between consecutive chunks, in seconds.
    pub overlap_seconds: f64,
    /// Chunks with fewer words are merged, and skipped when recorded.
    pub min_words_per_chunk: usize,
    /// Chunk records with shorter text are skipped.
    pub min_chars_per_chunk: usize,
    /// Hard cap on words per chunk.
    pub max_words_per_chunk: usize,
    /// Extend chunks to a nearby sentence end.
    pub prefer_sentence_breaks: bool,
    /// How far past the window to look for a sentence end, in seconds.
    pub lookahead_seconds: f64,
    /// Labels requested from the entity labeler.
    pub ner_labels: Vec<String>,
    /// Labeler confidence threshold.
    pub ner_threshold: f32,
    /// Batches with shorter trimmed text are not labeled.
    pub min_text_length_for_ner: usize,
    /// Estimated-token budget per labeling batch.
    pub ner_token_limit: usize,
    /// Estimated tokens per whitespace-separated word.
    pub tokens_per_word: f64,
    /// Floor section starts when assigning words to later sections.
    pub floor_section_starts: bool,
    /// Texts per `Embedder::encode` call.
    pub embedding_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_seconds: 30.0,
            overlap_seconds: 8.0,
            min_words_per_chunk: 10,
            min_chars_per_chunk: 50,
            max_words_per_chunk: 200,
            prefer_sentence_breaks: true,
            lookahead_seconds: 3.0,
            ner_labels: DEFAULT_NER_LABELS.iter().map(|s| (*s).to_string()).collect(),
            ner_threshold: 0.3,
            min_text_length_for_ner: 50,
            ner_token_limit: 300,
            tokens_per_word: 1.3,
            floor_section_starts: false,
            embedding_batch_size: 32,
        }
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{name}={raw:?} is not a valid value")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!("{name}={raw:?} is not a boolean"))),
    }
}

impl Config {
    /// Defaults overlaid with the process environment, then validated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first unparseable
    /// variable, or the first failed [`validate`](Self::validate) check.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CHUNK_SECONDS") {
            config.chunk_seconds = parse("CHUNK_SECONDS", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP_SECONDS") {
            config.overlap_seconds = parse("CHUNK_OVERLAP_SECONDS", &v)?;
        }
        if let Some(v) = get("MIN_WORDS_PER_CHUNK") {
            config.min_words_per_chunk = parse("MIN_WORDS_PER_CHUNK", &v)?;
        }
        if let Some(v) = get("MIN_CHARS_PER_CHUNK") {
            config.min_chars_per_chunk = parse("MIN_CHARS_PER_CHUNK", &v)?;
        }
        if let Some(v) = get("MAX_WORDS_PER_CHUNK") {
            config.max_words_per_chunk = parse("MAX_WORDS_PER_CHUNK", &v)?;
        }
        if let Some(v) = get("PREFER_SENTENCE_BREAKS") {
            config.prefer_sentence_breaks = parse_bool("PREFER_SENTENCE_BREAKS", &v)?;
        }
        if let Some(v) = get("LOOKAHEAD_SECONDS") {
            config.lookahead_seconds = parse("LOOKAHEAD_SECONDS", &v)?;
        }
        if let Some(v) = get("NER_LABELS") {
            config.ner_labels = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("NER_THRESHOLD") {
            config.ner_threshold = parse("NER_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MIN_TEXT_LENGTH_FOR_NER") {
            config.min_text_length_for_ner = parse("MIN_TEXT_LENGTH_FOR_NER", &v)?;
        }
        if let Some(v) = get("NER_TOKEN_LIMIT") {
            config.ner_token_limit = parse("NER_TOKEN_LIMIT", &v)?;
        }
        if let Some(v) = get("FLOOR_SECTION_STARTS") {
            config.floor_section_starts = parse_bool("FLOOR_SECTION_STARTS", &v)?;
        }
        if let Some(v) = get("EMBEDDING_BATCH_SIZE") {
            config.embedding_batch_size = parse("EMBEDDING_BATCH_SIZE", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] for malformed JSON and
    /// [`Error::InvalidConfig`] for values failing [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.max_words_per_chunk == 0 {
            return invalid("max_words_per_chunk must be > 0");
        }
        if self.min_words_per_chunk > self.max_words_per_chunk {
            return Err(Error::InvalidConfig(format!(
                "min_words_per_chunk ({}) exceeds max_words_per_chunk ({})",
                self.min_words_per_chunk, self.max_words_per_chunk
            )));
        }
        if !(self.chunk_seconds.is_finite() && self.chunk_seconds > 0.0) {
            return invalid("chunk_seconds must be a positive number");
        }
        if !self.overlap_seconds.is_finite() || self.overlap_seconds < 0.0 {
            return invalid("overlap_seconds must be a non-negative number");
        }
        if !self.lookahead_seconds.is_finite() || self.lookahead_seconds < 0.0 {
            return invalid("lookahead_seconds must be a non-negative number");
        }
        if self.ner_labels.is_empty() {
            return invalid("ner_labels must not be empty");
        }
        if self.embedding_batch_size == 0 {
            return invalid("embedding_batch_size must be > 0");
        }
        Ok(())
    }

    /// Temporal chunker for these settings, with an optional window and
    /// overlap override.
    #[must_use]
    pub fn temporal_chunker(&self, chunk_seconds: Option<f64>, overlap_seconds: Option<f64>) -> TemporalChunker {
        let chunker = TemporalChunker::new(
            chunk_seconds.unwrap_or(self.chunk_seconds),
            overlap_seconds.unwrap_or(self.overlap_seconds),
        )
        .with_word_bounds(self.min_words_per_chunk, self.max_words_per_chunk.max(1));

        if self.prefer_sentence_breaks {
            chunker.with_sentence_breaks(self.lookahead_seconds)
        } else {
            chunker.without_sentence_breaks()
        }
    }

    /// Reconciler for these settings.
    #[must_use]
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new().with_floored_starts(self.floor_section_starts)
    }

    /// Batcher for these settings.
    #[must_use]
    pub fn ner_batcher(&self) -> NerBatcher {
        NerBatcher::new(self.ner_token_limit, self.tokens_per_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!((config.chunk_seconds - 30.0).abs() < f64::EPSILON);
        assert_eq!(config.max_words_per_chunk, 200);
        assert_eq!(config.ner_labels.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        let config = Config::from_lookup(lookup(&[
            ("CHUNK_SECONDS", "45"),
            ("PREFER_SENTENCE_BREAKS", "False"),
            ("NER_LABELS", "person, place ,,"),
            ("MIN_WORDS_PER_CHUNK", " "),
            ("EMBEDDING_BATCH_SIZE", "8"),
        ]))
        .unwrap();
        assert!((config.chunk_seconds - 45.0).abs() < f64::EPSILON);
        assert!(!config.prefer_sentence_breaks);
        assert_eq!(config.ner_labels, ["person", "place"]);
        assert_eq!(config.min_words_per_chunk, 10);
        assert_eq!(config.embedding_batch_size, 8);
    }

    #[test]
    fn test_env_bad_value_names_variable() {
        let err = Config::from_lookup(lookup(&[("MAX_WORDS_PER_CHUNK", "lots")])).unwrap_err();
        assert!(err.to_string().contains("MAX_WORDS_PER_CHUNK"));
    }

    #[test]
    fn test_json_partial() {
        let config = Config::from_json(r#"{"overlap_seconds": 0, "floor_section_starts": true}"#).unwrap();
        assert!(config.overlap_seconds.abs() < f64::EPSILON);
        assert!(config.floor_section_starts);
        assert_eq!(config.min_chars_per_chunk, 50);
    }

    #[test]
    fn test_validation() {
        assert!(Config::from_json(r#"{"max_words_per_chunk": 0}"#).is_err());
        assert!(Config::from_json(r#"{"min_words_per_chunk": 300}"#).is_err());
        assert!(Config::from_json(r#"{"chunk_seconds": -1}"#).is_err());
        assert!(Config::from_json(r#"{"ner_labels": []}"#).is_err());
        assert!(matches!(Config::from_json("{"), Err(Error::Payload(_))));
    }

    #[test]
    fn test_temporal_chunker_override() {
        let config = Config::default();
        let chunker = config.temporal_chunker(Some(10.0), Some(2.0));
        assert!((chunker.chunk_seconds() - 10.0).abs() < f64::EPSILON);
        assert!((chunker.overlap_seconds() - 2.0).abs() < f64::EPSILON);
        assert_eq!(chunker.budget().max(), 200);
    }
}
