//! End-to-end story processing.
//!
//! ```text
//! payload ──► reconcile ──► sections ──► label entities ──► attach to paragraphs
//!                               │                                │
//!                               └──► temporal chunks per paragraph ◄── entity overlap
//!                                           │
//!                                           ▼
//!                          embed chunk texts (embedding_batch_size per call)
//!                                           │
//!                                           ▼
//!                                StoryRecord + ChunkRecords ──► VectorStore
//! ```
//!
//! Chunks never cross paragraph boundaries, so every chunk has exactly one
//! speaker and one section.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::entity::{attach_entities, distinct_labels, EntityExtractor, NerStats, TimedEntity};
use crate::ids::story_uuid;
use crate::model::{Embedder, EntityLabeler};
use crate::payload::{StoryMeta, StoryPayload};
use crate::store::{ChunkEntity, ChunkRecord, CollectionInfo, StoryRecord, VectorStore, WordTimestamp, CHUNK_CLASS};
use crate::temporal::TemporalChunker;
use crate::word::{speakers, words_to_text, Section};
use crate::{Error, Result, WordChunker};

/// Collection id used when neither the request nor the story names one.
pub const DEFAULT_COLLECTION_ID: &str = "Collection";

/// Per-request options.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Run entity extraction (requires a labeler).
    pub run_ner: bool,
    /// Override the configured chunk window.
    pub chunk_seconds: Option<f64>,
    /// Override the configured overlap.
    pub overlap_seconds: Option<f64>,
    /// Collection metadata; blank fields fall back to the story's own.
    pub collection: Option<CollectionInfo>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            run_ner: true,
            chunk_seconds: None,
            overlap_seconds: None,
            collection: None,
        }
    }
}

/// The result of processing one story.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedStory {
    /// The story record.
    pub story: StoryRecord,
    /// Chunk records with their embeddings.
    pub chunks: Vec<ChunkRecord>,
    /// Entity extraction counters.
    pub ner_stats: NerStats,
}

impl ProcessedStory {
    /// Replace the story and its chunks in `store`.
    ///
    /// Deletes chunks left by a previous run, upserts the story, then
    /// batch-inserts the new chunks (skipped when there are none).
    ///
    /// # Errors
    ///
    /// Returns the first store error. A partial chunk insert is
    /// [`Error::BatchInsert`].
    pub fn write(&self, store: &dyn VectorStore) -> Result<()> {
        let removed = store.delete_by_parent(CHUNK_CLASS, self.story.id)?;
        debug!(story = %self.story.id, removed, "deleted previous chunks");

        store.upsert(self.story.to_object()?)?;

        if self.chunks.is_empty() {
            info!(story = %self.story.id, "no chunks to insert");
            return Ok(());
        }
        let objects = self
            .chunks
            .iter()
            .map(|chunk| chunk.to_object(&self.story))
            .collect::<Result<Vec<_>>>()?;
        store.batch_insert(objects)?;
        info!(story = %self.story.id, chunks = self.chunks.len(), "story written");
        Ok(())
    }
}

/// Runs reconciliation, entity extraction, chunking, and embedding.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use timeslab::{Config, Embedder, ProcessOptions, Result, StoryPayload, StoryProcessor};
///
/// struct Lengths;
///
/// impl Embedder for Lengths {
///     fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
///         Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
///     }
/// }
///
/// let payload = StoryPayload::from_json(r#"{
///     "story": {"_id": "s1", "title": "Interview"},
///     "transcript": {
///         "words": [
///             {"text": "We", "start": 0.0, "end": 0.2},
///             {"text": "moved", "start": 0.3, "end": 0.6},
///             {"text": "north.", "start": 0.7, "end": 1.0}
///         ],
///         "paragraphs": [{"speaker": "Ann", "start": 0.0, "end": 1.0}]
///     }
/// }"#)?;
///
/// let config = Config { min_words_per_chunk: 1, min_chars_per_chunk: 1, ..Config::default() };
/// let processor = StoryProcessor::new(config, Arc::new(Lengths))?;
/// let processed = processor.process(&payload, &ProcessOptions::default())?;
///
/// assert_eq!(processed.chunks.len(), 1);
/// assert_eq!(processed.chunks[0].text, "We moved north.");
/// assert_eq!(processed.story.participants, ["Ann"]);
/// # Ok::<(), timeslab::Error>(())
/// ```
#[derive(Clone)]
pub struct StoryProcessor {
    config: Config,
    embedder: Arc<dyn Embedder>,
    labeler: Option<Arc<dyn EntityLabeler>>,
}

impl StoryProcessor {
    /// Create a processor without entity extraction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            labeler: None,
        })
    }

    /// Enable entity extraction with `labeler`.
    #[must_use]
    pub fn with_labeler(mut self, labeler: Arc<dyn EntityLabeler>) -> Self {
        self.labeler = Some(labeler);
        self
    }

    /// The settings in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process one story.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingStoryId`] when the payload has no story id,
    /// and embedding errors from the embedder. Labeler failures are
    /// counted in [`NerStats`] and do not fail the run.
    pub fn process(&self, payload: &StoryPayload, options: &ProcessOptions) -> Result<ProcessedStory> {
        let story_id = payload.story_id().ok_or(Error::MissingStoryId)?;
        let collection = resolve_collection(options.collection.as_ref(), &payload.story);
        let id = story_uuid(&collection.id, &story_id);
        info!(%story_id, %id, collection = %collection.id, "processing story");

        let mut sections = self
            .config
            .reconciler()
            .reconcile(&payload.transcript, &payload.story.indexes);

        let (entities, ner_stats) = match (&self.labeler, options.run_ner) {
            (Some(labeler), true) => self.extractor(Arc::clone(labeler)).extract(&sections),
            _ => {
                debug!("entity extraction skipped");
                (vec![], NerStats::default())
            }
        };
        attach_entities(&mut sections, &entities);

        let chunker = self
            .config
            .temporal_chunker(options.chunk_seconds, options.overlap_seconds);
        let mut chunks = self.chunk_records(&sections, &chunker, &entities);
        self.embed(&mut chunks)?;
        info!(chunks = chunks.len(), entities = entities.len(), "story processed");

        let meta = &payload.story;
        let story = StoryRecord {
            id,
            story_id,
            title: meta.title.clone().unwrap_or_default(),
            description: meta.description.clone().unwrap_or_default(),
            date: meta.record_date.clone().unwrap_or_default(),
            duration: meta.duration_seconds(),
            participants: speakers(&sections),
            labels: distinct_labels(&entities),
            entities,
            sections,
            video_url: payload.video_url.clone().unwrap_or_default(),
            transcoded: meta.transcoded.clone().unwrap_or_default(),
            thumbnail_url: meta.thumbnail_url.clone().unwrap_or_default(),
            publisher: meta.publisher().unwrap_or_default().to_string(),
            asset_id: meta.asset_id.clone().unwrap_or_default(),
            organization_id: meta.organization_id.clone().unwrap_or_default(),
            project_id: meta.project_id.clone().unwrap_or_default(),
            is_audio: meta.is_audio(),
            collection,
        };

        Ok(ProcessedStory {
            story,
            chunks,
            ner_stats,
        })
    }

    fn extractor(&self, labeler: Arc<dyn EntityLabeler>) -> EntityExtractor {
        EntityExtractor::new(labeler, self.config.ner_labels.clone())
            .with_threshold(self.config.ner_threshold)
            .with_min_text_length(self.config.min_text_length_for_ner)
            .with_batcher(self.config.ner_batcher())
    }

    /// Chunk every paragraph and keep the chunks worth indexing.
    fn chunk_records(
        &self,
        sections: &[Section],
        chunker: &TemporalChunker,
        entities: &[TimedEntity],
    ) -> Vec<ChunkRecord> {
        let mut records = Vec::new();

        for (section_idx, section) in sections.iter().enumerate() {
            for (para_idx, para) in section.paragraphs.iter().enumerate() {
                for slab in chunker.chunk(&para.words) {
                    let text = words_to_text(&slab.words);
                    if text.is_empty()
                        || text.chars().count() < self.config.min_chars_per_chunk
                        || slab.len() < self.config.min_words_per_chunk
                    {
                        continue;
                    }

                    let overlapping: Vec<&TimedEntity> = entities
                        .iter()
                        .filter(|e| e.overlaps_range(slab.start_time, slab.end_time))
                        .collect();
                    let mut labels: Vec<String> = Vec::new();
                    for e in &overlapping {
                        if !labels.contains(&e.label) {
                            labels.push(e.label.clone());
                        }
                    }

                    records.push(ChunkRecord {
                        chunk_id: records.len(),
                        start_time: slab.start_time,
                        end_time: slab.end_time,
                        text,
                        word_timestamps: slab.words.iter().map(WordTimestamp::from).collect(),
                        section_idx,
                        para_idx,
                        section_title: section.title.clone(),
                        speaker: para.speaker.clone(),
                        entities: overlapping.iter().map(|e| ChunkEntity::from(*e)).collect(),
                        labels,
                        entity_texts: overlapping.iter().map(|e| e.text.clone()).collect(),
                        vector: vec![],
                    });
                }
            }
        }

        debug!(chunks = records.len(), "built chunk records");
        records
    }

    /// Embed chunk texts, `embedding_batch_size` texts per call.
    fn embed(&self, chunks: &mut [ChunkRecord]) -> Result<()> {
        let batch_size = self.config.embedding_batch_size.max(1);
        debug!(texts = chunks.len(), batch_size, "embedding chunks");

        for batch in chunks.chunks_mut(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.encode(&texts)?;
            if vectors.len() != texts.len() {
                return Err(Error::EmbeddingCountMismatch {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.vector = vector;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StoryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryProcessor")
            .field("config", &self.config)
            .field("ner", &self.labeler.is_some())
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Capitalise the first letter of each alphabetic run, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
        } else {
            out.push(c);
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Request collection fields, then the story's, then defaults.
fn resolve_collection(request: Option<&CollectionInfo>, story: &StoryMeta) -> CollectionInfo {
    let id = non_blank(request.map(|c| c.id.as_str()))
        .or_else(|| non_blank(story.collection_id.as_deref()))
        .unwrap_or_else(|| DEFAULT_COLLECTION_ID.to_string());
    let name = non_blank(request.map(|c| c.name.as_str()))
        .or_else(|| non_blank(story.collection_name.as_deref()))
        .unwrap_or_else(|| title_case(&id.replace(['-', '_'], " ")));
    let description = non_blank(request.map(|c| c.description.as_str()))
        .or_else(|| non_blank(story.collection_description.as_deref()))
        .unwrap_or_default();
    CollectionInfo { id, name, description }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::store::{InMemoryStore, STORY_CLASS};
    use serde_json::json;

    struct Constant;

    impl Embedder for Constant {
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct Short;

    impl Embedder for Short {
        fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0]])
        }
    }

    /// Records the size of every `encode` call.
    #[derive(Default)]
    struct Recording {
        calls: std::sync::Mutex<Vec<usize>>,
    }

    impl Embedder for Recording {
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct Detroit;

    impl EntityLabeler for Detroit {
        fn label(&self, text: &str, _labels: &[String], _threshold: f32) -> Result<Vec<Entity>> {
            Ok(text
                .match_indices("Detroit")
                .map(|(i, m)| Entity {
                    text: m.into(),
                    label: "location".into(),
                    start: i,
                    end: i + m.len(),
                    score: None,
                })
                .collect())
        }
    }

    fn config() -> Config {
        Config {
            chunk_seconds: 3.0,
            overlap_seconds: 0.0,
            prefer_sentence_breaks: false,
            min_words_per_chunk: 1,
            min_chars_per_chunk: 1,
            min_text_length_for_ner: 1,
            ..Config::default()
        }
    }

    /// Two paragraphs of five one-second words each.
    fn payload() -> StoryPayload {
        let texts = ["we", "lived", "in", "Detroit", "then.", "later", "we", "moved", "to", "Ohio."];
        let words: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(k, t)| json!({"text": t, "start": k as f64, "end": k as f64 + 0.8}))
            .collect();
        serde_json::from_value(json!({
            "story": {"_id": "abc", "title": "Move", "record_date": "1990-05-01", "collection_id": "oral_histories"},
            "transcript": {
                "words": words,
                "paragraphs": [
                    {"speaker": "Ann", "start": 0, "end": 4.8},
                    {"speaker": "Bob", "start": 5, "end": 9.8}
                ]
            },
            "videoURL": "https://example.org/v.mp4"
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_story_id() {
        let processor = StoryProcessor::new(config(), Arc::new(Constant)).unwrap();
        let err = processor
            .process(&StoryPayload::default(), &ProcessOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingStoryId));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = Config {
            max_words_per_chunk: 0,
            ..Config::default()
        };
        assert!(StoryProcessor::new(bad, Arc::new(Constant)).is_err());
    }

    #[test]
    fn test_process_builds_records() {
        let processor = StoryProcessor::new(config(), Arc::new(Constant))
            .unwrap()
            .with_labeler(Arc::new(Detroit));
        let processed = processor.process(&payload(), &ProcessOptions::default()).unwrap();

        // 3 s windows inside each 5-word paragraph: [0..3) [3..5) per paragraph
        let texts: Vec<&str> = processed.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["we lived in", "Detroit then.", "later we moved", "to Ohio."]);
        assert_eq!(processed.chunks[2].speaker, "Bob");
        assert_eq!(processed.chunks[2].para_idx, 1);
        assert!(processed.chunks.iter().enumerate().all(|(i, c)| c.chunk_id == i));
        assert!(processed.chunks.iter().all(|c| c.vector == vec![1.0, 0.0]));

        assert_eq!(processed.chunks[1].labels, ["location"]);
        assert_eq!(processed.chunks[1].entity_texts, ["Detroit"]);
        assert!(processed.chunks[0].entities.is_empty());

        let story = &processed.story;
        assert_eq!(story.story_id, "abc");
        assert_eq!(story.participants, ["Ann", "Bob"]);
        assert_eq!(story.labels, ["location"]);
        assert_eq!(story.collection.id, "oral_histories");
        assert_eq!(story.collection.name, "Oral Histories");
        assert_eq!(story.sections[0].paragraphs[0].ner.len(), 1);
        assert_eq!(processed.ner_stats.entities_found, 1);
    }

    #[test]
    fn test_run_ner_false_skips_labeler() {
        let processor = StoryProcessor::new(config(), Arc::new(Constant))
            .unwrap()
            .with_labeler(Arc::new(Detroit));
        let options = ProcessOptions {
            run_ner: false,
            ..ProcessOptions::default()
        };
        let processed = processor.process(&payload(), &options).unwrap();
        assert!(processed.story.entities.is_empty());
        assert_eq!(processed.ner_stats, NerStats::default());
    }

    #[test]
    fn test_small_chunks_filtered() {
        let strict = Config {
            min_words_per_chunk: 3,
            ..config()
        };
        let processor = StoryProcessor::new(strict, Arc::new(Constant)).unwrap();
        let processed = processor.process(&payload(), &ProcessOptions::default()).unwrap();
        // undersized tails merge into their predecessor: one chunk per paragraph
        let texts: Vec<&str> = processed.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["we lived in Detroit then.", "later we moved to Ohio."]);
    }

    #[test]
    fn test_embedding_count_mismatch() {
        let processor = StoryProcessor::new(config(), Arc::new(Short)).unwrap();
        let err = processor.process(&payload(), &ProcessOptions::default()).unwrap_err();
        assert!(matches!(err, Error::EmbeddingCountMismatch { expected: 4, got: 1 }));
    }

    #[test]
    fn test_embedding_batches_follow_config() {
        let recording = Arc::new(Recording::default());
        let batched = Config {
            embedding_batch_size: 3,
            ..config()
        };
        let processor = StoryProcessor::new(batched, recording.clone()).unwrap();
        let processed = processor.process(&payload(), &ProcessOptions::default()).unwrap();

        assert_eq!(*recording.calls.lock().unwrap(), [3, 1]);
        // vectors stay aligned with their chunks across batches
        for chunk in &processed.chunks {
            assert_eq!(chunk.vector, vec![chunk.text.len() as f32]);
        }
    }

    #[test]
    fn test_tail_past_max_keeps_every_word() {
        let tight = Config {
            chunk_seconds: 4.0,
            min_words_per_chunk: 3,
            max_words_per_chunk: 4,
            ..config()
        };
        let processor = StoryProcessor::new(tight, Arc::new(Constant)).unwrap();
        let processed = processor.process(&payload(), &ProcessOptions::default()).unwrap();

        let texts: Vec<&str> = processed.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            ["we lived in Detroit", "in Detroit then.", "later we moved to", "moved to Ohio."]
        );

        let mut starts: Vec<f64> = processed
            .chunks
            .iter()
            .flat_map(|c| c.word_timestamps.iter().map(|w| w.start))
            .collect();
        starts.sort_by(f64::total_cmp);
        starts.dedup();
        assert_eq!(starts, (0..10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_request_collection_wins() {
        let processor = StoryProcessor::new(config(), Arc::new(Constant)).unwrap();
        let options = ProcessOptions {
            collection: Some(CollectionInfo {
                id: "Veterans".into(),
                name: String::new(),
                description: "War stories".into(),
            }),
            ..ProcessOptions::default()
        };
        let processed = processor.process(&payload(), &options).unwrap();
        let c = &processed.story.collection;
        assert_eq!((c.id.as_str(), c.name.as_str(), c.description.as_str()), ("Veterans", "Veterans", "War stories"));
        assert_eq!(processed.story.id, story_uuid("veterans", "abc"));
    }

    #[test]
    fn test_write_replaces_previous_chunks() {
        let processor = StoryProcessor::new(config(), Arc::new(Constant)).unwrap();
        let store = InMemoryStore::new();

        let first = processor.process(&payload(), &ProcessOptions::default()).unwrap();
        first.write(&store).unwrap();
        assert_eq!(store.objects(CHUNK_CLASS).len(), 4);

        let coarse = ProcessOptions {
            chunk_seconds: Some(10.0),
            ..ProcessOptions::default()
        };
        let second = processor.process(&payload(), &coarse).unwrap();
        second.write(&store).unwrap();

        assert_eq!(store.objects(STORY_CLASS).len(), 1);
        assert_eq!(store.objects(CHUNK_CLASS).len(), 2);
        let chunk = &store.objects(CHUNK_CLASS)[0];
        assert_eq!(chunk.parent, Some(second.story.id));
        assert_eq!(chunk.properties["date"], "1990-05-01T00:00:00Z");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("oral histories"), "Oral Histories");
        assert_eq!(title_case("WW2 vets"), "Ww2 Vets");
    }
}
