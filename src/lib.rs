//! # timeslab
//!
//! Segmentation of timestamped interview transcripts for retrieval.
//!
//! ## The Problem
//!
//! A recorded interview arrives as a flat list of timed words, a list of
//! speaker paragraphs, and (sometimes) a human-written index of sections.
//! Retrieval needs pieces small enough to embed, large enough to carry
//! meaning, and anchored to playback time so a search hit can seek the
//! video.
//!
//! That sounds like splitting text, but consider:
//!
//! - A chunk cut mid-sentence embeds poorly and reads badly as a result
//! - A chunk spanning two speakers attributes words to the wrong person
//! - Index timestamps are hand-typed, overlap, and don't match word times
//! - Entity spans come back as character offsets, not seconds
//!
//! ## Pipeline
//!
//! ```text
//! words + paragraphs + index
//!          │
//!          ▼
//!   Reconciler ──► sections ──► paragraphs ──► words
//!          │
//!          ├──► EntityExtractor ──► char spans ──► WordSpans ──► seconds
//!          │
//!          └──► TemporalChunker (per paragraph) ──► Slabs ──► Embedder
//! ```
//!
//! ## Chunking Strategies
//!
//! ### Sentence-Greedy
//!
//! Whole sentences packed up to a word budget, with an optional sentence
//! overlap. Timestamps ride along but do not drive the cut.
//!
//! **When to use**: Text-first retrieval, uneven speech pace.
//! **Weakness**: Chunk durations vary wildly.
//!
//! ### Temporal-Hybrid
//!
//! Fixed time windows with an overlap in seconds, extended to a nearby
//! sentence end when one is within the lookahead.
//!
//! ```text
//! chunk = 30s, overlap = 8s, lookahead = 3s
//!
//! Chunk 0: [0 ........................ 30|.2]     <- extended to "then."
//! Chunk 1:                    [22.4 ............... 52.9]
//! ```
//!
//! **When to use**: Playback-anchored search (the default pipeline).
//! **Weakness**: Long monologues still hit the word cap mid-sentence.
//!
//! ## Quick Start
//!
//! ```rust
//! use timeslab::{SentenceChunker, TemporalChunker, Word, WordChunker};
//!
//! let words: Vec<Word> = "We moved in May. It rained all summer."
//!     .split(' ')
//!     .enumerate()
//!     .map(|(i, t)| Word::new(t, i as f64, i as f64 + 0.8))
//!     .collect();
//!
//! // One sentence per chunk
//! let slabs = SentenceChunker::new(1, 4).chunk(&words);
//! assert_eq!(slabs[0].text, "We moved in May.");
//!
//! // 3-second windows, no overlap, extended to a sentence end
//! let slabs = TemporalChunker::new(3.0, 0.0).with_word_bounds(1, 50).chunk(&words);
//! assert_eq!(slabs[0].text, "We moved in May.");
//! assert_eq!(slabs[0].end_time, 3.8);
//! ```
//!
//! ## Model Backends
//!
//! Sentence detection, entity labeling, and embedding sit behind the
//! [`SentenceSegmenter`], [`EntityLabeler`], and [`Embedder`] traits. A
//! local fastembed backend is available with the `semantic` feature:
//!
//! ```rust,ignore
//! use timeslab::{Config, FastEmbedder, StoryProcessor};
//!
//! let processor = StoryProcessor::new(Config::from_env()?, Arc::new(FastEmbedder::new(32)?))?;
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

mod capacity;
mod config;
mod entity;
mod error;
mod ids;
mod model;
mod payload;
mod pipeline;
mod reconcile;
mod segment;
mod sentence;
mod slab;
mod spans;
mod store;
mod temporal;
mod word;

#[cfg(feature = "semantic")]
mod semantic;

pub use capacity::{WordBudget, WordBudgetError};
pub use config::{Config, DEFAULT_NER_LABELS};
pub use entity::{
    attach_entities, distinct_labels, map_entity_to_time, Entity, EntityExtractor, NerBatch, NerBatcher,
    NerStats, TimedEntity,
};
pub use error::{Error, RecordFailure, Result};
pub use ids::{chunk_uuid, convert_to_uuid, story_uuid, to_store_date};
pub use model::{Embedder, EntityLabeler, SentenceSegmenter};
pub use payload::{
    value_to_seconds, Author, RawParagraph, RawTranscript, RawWord, SectionMeta, SectionTime, StoryIndex,
    StoryMeta, StoryPayload,
};
pub use pipeline::{ProcessOptions, ProcessedStory, StoryProcessor, DEFAULT_COLLECTION_ID};
pub use reconcile::{
    plan_sections, select_index, PlannedSection, Reconciler, AUTO_SECTION_TITLE, COMPLETE_TRANSCRIPT_TITLE,
};
pub use segment::{sentence_ranges, UnicodeSentenceSegmenter};
pub use sentence::SentenceChunker;
pub use slab::Slab;
pub use spans::{char_to_byte_offset, WordSpan, WordSpans};
pub use store::{
    ChunkEntity, ChunkRecord, CollectionInfo, InMemoryStore, StoreObject, StoryRecord, VectorStore,
    WordTimestamp, CHUNK_CLASS, STORY_CLASS,
};
pub use temporal::{is_sentence_end, TemporalChunker, MAX_OVERLAP_RATIO, MIN_CHUNK_SECONDS};
pub use word::{
    most_common_speaker, normalize_text, speakers, words_to_text, Paragraph, Section, Word, UNKNOWN_SPEAKER,
};

#[cfg(feature = "semantic")]
pub use semantic::FastEmbedder;

/// A word-level chunking strategy.
///
/// Both chunkers implement this trait, so the pipeline can swap them:
///
/// ```rust
/// use timeslab::{SentenceChunker, Slab, TemporalChunker, Word, WordChunker};
///
/// fn chunk_paragraph(chunker: &dyn WordChunker, words: &[Word]) -> Vec<Slab> {
///     chunker.chunk(words)
/// }
///
/// let words = vec![Word::new("Hello", 0.0, 0.4), Word::new("there.", 0.5, 0.9)];
/// let by_sentence = chunk_paragraph(&SentenceChunker::new(1, 10), &words);
/// let by_time = chunk_paragraph(&TemporalChunker::default(), &words);
/// assert_eq!(by_sentence, by_time);
/// ```
pub trait WordChunker: Send + Sync {
    /// Split timed words into chunks.
    ///
    /// Each chunk is a [`Slab`] holding a contiguous run of the input,
    /// its normalised text, and its time span. Chunks cover every usable
    /// word in order; consecutive chunks may overlap.
    fn chunk(&self, words: &[Word]) -> Vec<Slab>;
}
