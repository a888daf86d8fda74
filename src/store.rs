//! Output records and the vector-store seam.
//!
//! A processed story becomes one story object plus one object per chunk.
//! Chunk objects carry a `parent` link to their story so a re-ingest can
//! delete the previous chunks before writing new ones.
//!
//! The store itself is a trait; [`InMemoryStore`] backs tests and local
//! runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::TimedEntity;
use crate::error::RecordFailure;
use crate::ids::{chunk_uuid, to_store_date};
use crate::word::{Section, Word};
use crate::{Error, Result};

/// Class name of story objects.
pub const STORY_CLASS: &str = "Testimonies";

/// Class name of chunk objects.
pub const CHUNK_CLASS: &str = "Chunks";

/// One object as written to a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreObject {
    /// Collection/class the object belongs to.
    pub class: String,
    /// Object id.
    pub id: Uuid,
    /// Id of the object this one belongs to, if any.
    pub parent: Option<Uuid>,
    /// Arbitrary JSON properties.
    pub properties: Value,
    /// Embedding, if the object is searchable by vector.
    pub vector: Option<Vec<f32>>,
}

/// Persistence for story and chunk objects.
pub trait VectorStore: Send + Sync {
    /// Create the object, or replace an existing one with the same class
    /// and id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the write fails.
    fn upsert(&self, object: StoreObject) -> Result<()>;

    /// Insert many objects.
    ///
    /// Accepted objects stay written even when others are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchInsert`] listing every rejected object, or
    /// [`Error::Store`] when the batch could not be sent at all.
    fn batch_insert(&self, objects: Vec<StoreObject>) -> Result<()>;

    /// Delete every object of `class` whose parent is `parent`, returning
    /// how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when the delete fails.
    fn delete_by_parent(&self, class: &str, parent: Uuid) -> Result<usize>;
}

/// A [`VectorStore`] held in memory.
///
/// Batch inserts reject objects whose class and id already exist.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: Mutex<BTreeMap<(String, Uuid), StoreObject>>,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, Uuid), StoreObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up one object.
    #[must_use]
    pub fn get(&self, class: &str, id: Uuid) -> Option<StoreObject> {
        self.lock().get(&(class.to_string(), id)).cloned()
    }

    /// All objects of `class`, ordered by id.
    #[must_use]
    pub fn objects(&self, class: &str) -> Vec<StoreObject> {
        self.lock()
            .values()
            .filter(|o| o.class == class)
            .cloned()
            .collect()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl VectorStore for InMemoryStore {
    fn upsert(&self, object: StoreObject) -> Result<()> {
        self.lock().insert((object.class.clone(), object.id), object);
        Ok(())
    }

    fn batch_insert(&self, objects: Vec<StoreObject>) -> Result<()> {
        let total = objects.len();
        let mut failures = Vec::new();
        let mut map = self.lock();

        for (index, object) in objects.into_iter().enumerate() {
            let key = (object.class.clone(), object.id);
            if map.contains_key(&key) {
                failures.push(RecordFailure {
                    index,
                    message: format!("{} {} already exists", object.class, object.id),
                });
                continue;
            }
            map.insert(key, object);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::BatchInsert { total, failures })
        }
    }

    fn delete_by_parent(&self, class: &str, parent: Uuid) -> Result<usize> {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, o| !(o.class == class && o.parent == Some(parent)));
        Ok(before - map.len())
    }
}

/// Collection a story is filed under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}

/// A word's timing inside a chunk record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    /// Start in seconds.
    pub start: f64,
    /// End in seconds.
    pub end: f64,
    /// Word text.
    pub text: String,
}

impl From<&Word> for WordTimestamp {
    fn from(word: &Word) -> Self {
        Self {
            start: word.start,
            end: word.end,
            text: word.text.clone(),
        }
    }
}

/// An entity as listed on a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEntity {
    /// Surface text.
    pub text: String,
    /// Label.
    pub label: String,
    /// Start in seconds.
    pub start_time: f64,
    /// End in seconds.
    pub end_time: f64,
}

impl From<&TimedEntity> for ChunkEntity {
    fn from(entity: &TimedEntity) -> Self {
        Self {
            text: entity.text.clone(),
            label: entity.label.clone(),
            start_time: entity.start_time,
            end_time: entity.end_time,
        }
    }
}

/// One retrievable chunk of a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Running index across the whole story.
    pub chunk_id: usize,
    /// First word's start.
    pub start_time: f64,
    /// Last word's end.
    pub end_time: f64,
    /// Normalised chunk text.
    pub text: String,
    /// Timing of every word.
    pub word_timestamps: Vec<WordTimestamp>,
    /// Section position.
    pub section_idx: usize,
    /// Paragraph position within the section.
    pub para_idx: usize,
    /// Section title.
    pub section_title: String,
    /// Paragraph speaker.
    pub speaker: String,
    /// Entities intersecting the chunk's time range.
    pub entities: Vec<ChunkEntity>,
    /// Distinct labels of those entities.
    pub labels: Vec<String>,
    /// Surface texts of those entities.
    pub entity_texts: Vec<String>,
    /// Embedding of `text`.
    #[serde(skip)]
    pub vector: Vec<f32>,
}

impl ChunkRecord {
    /// Build the store object for this chunk, linked to `story`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the record cannot be serialised.
    pub fn to_object(&self, story: &StoryRecord) -> Result<StoreObject> {
        let mut properties = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut properties {
            map.insert("story_uuid".into(), Value::String(story.id.to_string()));
            map.insert("interview_title".into(), Value::String(story.title.clone()));
            map.insert("recording_date".into(), Value::String(story.date.clone()));
            map.insert(
                "date".into(),
                to_store_date(&story.date).map_or(Value::Null, Value::String),
            );
            map.insert("interview_duration".into(), serde_json::to_value(story.duration)?);
            map.insert("video_url".into(), Value::String(story.video_url.clone()));
            map.insert("is_audio".into(), Value::Bool(story.is_audio));
            map.insert("collection".into(), serde_json::to_value(&story.collection)?);
        }
        Ok(StoreObject {
            class: CHUNK_CLASS.to_string(),
            id: chunk_uuid(story.id, self.chunk_id),
            parent: Some(story.id),
            properties,
            vector: (!self.vector.is_empty()).then(|| self.vector.clone()),
        })
    }
}

/// A processed story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    /// Store id, derived from collection and source id.
    pub id: Uuid,
    /// Source story id.
    pub story_id: String,
    /// Interview title.
    pub title: String,
    /// Interview description.
    pub description: String,
    /// Recording date as supplied.
    pub date: String,
    /// Duration in seconds.
    pub duration: f64,
    /// Distinct speakers, in order of appearance.
    pub participants: Vec<String>,
    /// Every entity found in the transcript.
    pub entities: Vec<TimedEntity>,
    /// Distinct entity labels.
    pub labels: Vec<String>,
    /// Reconciled sections, with entities attached to paragraphs.
    pub sections: Vec<Section>,
    /// Playback URL.
    pub video_url: String,
    /// Transcoded media reference.
    pub transcoded: String,
    /// Thumbnail URL.
    pub thumbnail_url: String,
    /// Author name.
    pub publisher: String,
    /// Upstream asset id.
    pub asset_id: String,
    /// Upstream organization id.
    pub organization_id: String,
    /// Upstream project id.
    pub project_id: String,
    /// Whether the media is audio-only.
    pub is_audio: bool,
    /// Collection the story is filed under.
    pub collection: CollectionInfo,
}

impl StoryRecord {
    /// Build the store object for this story.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the record cannot be serialised.
    pub fn to_object(&self) -> Result<StoreObject> {
        Ok(StoreObject {
            class: STORY_CLASS.to_string(),
            id: self.id,
            parent: None,
            properties: serde_json::to_value(self)?,
            vector: None,
        })
    }
}
