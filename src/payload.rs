//! Raw request payloads.
//!
//! Upstream transcripts are loosely typed: timings arrive as numbers or
//! numeric strings, ids as strings or integers, and any list may be `null`.
//! These types accept all of that and convert to the clean [`Word`] model
//! at one boundary, so nothing downstream sees a missing field.
//!
//! ```rust
//! use timeslab::StoryPayload;
//!
//! let payload = StoryPayload::from_json(r#"{
//!     "transcript": {
//!         "words": [{"text": "hi", "start": "0.5", "end": 0.9}, {"text": "", "start": 1, "end": 2}],
//!         "paragraphs": null,
//!         "storyId": 42
//!     },
//!     "story": {"title": "Oral history"}
//! }"#).unwrap();
//!
//! assert_eq!(payload.story_id().as_deref(), Some("42"));
//! assert_eq!(payload.transcript.words().len(), 1);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::word::Word;
use crate::Result;

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(de: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Accept strings, numbers, and booleans as text.
fn lenient_string<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(de)?.as_ref().and_then(value_to_string))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read seconds from a number or a numeric string.
#[must_use]
pub fn value_to_seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    seconds.is_finite().then_some(seconds)
}

/// The full ingestion request for one story.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryPayload {
    /// Words and paragraphs.
    #[serde(deserialize_with = "nullable")]
    pub transcript: RawTranscript,
    /// Story metadata, including section indexes.
    #[serde(deserialize_with = "nullable")]
    pub story: StoryMeta,
    /// Playback URL.
    #[serde(rename = "videoURL", deserialize_with = "lenient_string")]
    pub video_url: Option<String>,
}

impl StoryPayload {
    /// Parse a payload from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`](crate::Error::Payload) if `json` is not a
    /// JSON object of the expected shape.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The story identifier: `story._id`, else `transcript.storyId`.
    ///
    /// Blank ids count as absent.
    #[must_use]
    pub fn story_id(&self) -> Option<String> {
        [self.story.id.as_deref(), self.transcript.story_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// The transcript part of a payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTranscript {
    /// Flat word list for the whole recording.
    #[serde(deserialize_with = "nullable")]
    pub words: Vec<RawWord>,
    /// Speaker turns.
    #[serde(deserialize_with = "nullable")]
    pub paragraphs: Vec<RawParagraph>,
    /// Fallback story id.
    #[serde(rename = "storyId", deserialize_with = "lenient_string")]
    pub story_id: Option<String>,
}

impl RawTranscript {
    /// Well-formed words, in input order.
    #[must_use]
    pub fn words(&self) -> Vec<Word> {
        self.words.iter().filter_map(RawWord::to_word).collect()
    }
}

/// A word as it arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWord {
    /// Word text.
    #[serde(deserialize_with = "lenient_string")]
    pub text: Option<String>,
    /// Start time, number or numeric string.
    pub start: Option<Value>,
    /// End time, number or numeric string.
    pub end: Option<Value>,
}

impl RawWord {
    /// Convert to a [`Word`], or `None` if the word is malformed.
    ///
    /// Text is trimmed. Missing or unparseable timing, empty text, and
    /// `start > end` all drop the word.
    #[must_use]
    pub fn to_word(&self) -> Option<Word> {
        let text = self.text.as_deref()?.trim();
        let start = self.start.as_ref().and_then(value_to_seconds)?;
        let end = self.end.as_ref().and_then(value_to_seconds)?;
        let word = Word::new(text, start, end);
        word.is_well_formed().then_some(word)
    }
}

/// A speaker turn as it arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParagraph {
    /// Speaker label.
    #[serde(deserialize_with = "lenient_string")]
    pub speaker: Option<String>,
    /// Start time.
    pub start: Option<Value>,
    /// End time.
    pub end: Option<Value>,
    /// Explicit words. Often `null`, in which case the flat list is used.
    #[serde(deserialize_with = "nullable")]
    pub words: Vec<RawWord>,
}

impl RawParagraph {
    /// Start time in seconds, if present and numeric.
    #[must_use]
    pub fn start_seconds(&self) -> Option<f64> {
        self.start.as_ref().and_then(value_to_seconds)
    }

    /// End time in seconds, if present and numeric.
    #[must_use]
    pub fn end_seconds(&self) -> Option<f64> {
        self.end.as_ref().and_then(value_to_seconds)
    }

    /// Well-formed explicit words.
    #[must_use]
    pub fn words(&self) -> Vec<Word> {
        self.words.iter().filter_map(RawWord::to_word).collect()
    }
}

/// Story metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct StoryMeta {
    #[serde(rename = "_id", deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub record_date: Option<String>,
    pub duration: Option<Value>,
    /// Section indexes; the most recently updated one is used.
    #[serde(deserialize_with = "nullable")]
    pub indexes: Vec<StoryIndex>,
    #[serde(deserialize_with = "lenient_string")]
    pub transcoded: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub thumbnail_url: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub asset_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub organization_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub project_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub custom_archive_media_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub collection_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub collection_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub collection_description: Option<String>,
    pub author: Option<Author>,
}

impl StoryMeta {
    /// Duration in seconds, 0 when absent.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_ref().and_then(value_to_seconds).unwrap_or(0.0)
    }

    /// Whether the media is audio-only.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.custom_archive_media_type
            .as_deref()
            .is_some_and(|t| t.starts_with("audio"))
    }

    /// Publisher name.
    #[must_use]
    pub fn publisher(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.full_name.as_deref())
    }
}

/// Story author.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    /// Display name.
    #[serde(deserialize_with = "lenient_string")]
    pub full_name: Option<String>,
}

/// One version of a story's section index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryIndex {
    /// Index name.
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    /// Last update, as an ISO-8601 string. Compared lexically.
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
    /// Declared sections, in any order.
    #[serde(deserialize_with = "nullable")]
    pub metadata: Vec<SectionMeta>,
}

/// A declared section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionMeta {
    /// Section title.
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    /// Short summary.
    #[serde(deserialize_with = "lenient_string")]
    pub synopsis: Option<String>,
    /// Display timestamp such as `00:12:30`.
    #[serde(deserialize_with = "lenient_string")]
    pub timecode: Option<String>,
    /// Declared time range.
    #[serde(deserialize_with = "nullable")]
    pub time: SectionTime,
}

impl SectionMeta {
    /// Declared start in seconds, 0 when absent.
    #[must_use]
    pub fn start_seconds(&self) -> f64 {
        self.time.start.as_ref().and_then(value_to_seconds).unwrap_or(0.0)
    }

    /// Declared end in seconds, if any.
    #[must_use]
    pub fn end_seconds(&self) -> Option<f64> {
        self.time.end.as_ref().and_then(value_to_seconds)
    }
}

/// Declared section times.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct SectionTime {
    pub start: Option<Value>,
    pub end: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_seconds() {
        assert_eq!(value_to_seconds(&json!(1.5)), Some(1.5));
        assert_eq!(value_to_seconds(&json!(" 2.25 ")), Some(2.25));
        assert_eq!(value_to_seconds(&json!(3)), Some(3.0));
        assert_eq!(value_to_seconds(&json!("abc")), None);
        assert_eq!(value_to_seconds(&json!("NaN")), None);
        assert_eq!(value_to_seconds(&Value::Null), None);
    }

    #[test]
    fn test_raw_word_conversion() {
        let ok: RawWord = serde_json::from_value(json!({"text": " yes ", "start": "1", "end": 2})).unwrap();
        assert_eq!(ok.to_word(), Some(Word::new("yes", 1.0, 2.0)));

        for bad in [
            json!({"text": "", "start": 0, "end": 1}),
            json!({"text": "x", "start": null, "end": 1}),
            json!({"text": "x", "start": 2, "end": 1}),
            json!({"start": 0, "end": 1}),
            json!({"text": "x", "start": "soon", "end": 1}),
        ] {
            let raw: RawWord = serde_json::from_value(bad).unwrap();
            assert!(raw.to_word().is_none());
        }
    }

    #[test]
    fn test_nulls_become_defaults() {
        let payload = StoryPayload::from_json(
            r#"{"transcript": {"words": null, "paragraphs": [{"speaker": "A", "words": null}]},
                "story": {"indexes": null, "_id": "abc"}, "videoURL": null}"#,
        )
        .unwrap();
        assert!(payload.transcript.words.is_empty());
        assert_eq!(payload.transcript.paragraphs.len(), 1);
        assert!(payload.transcript.paragraphs[0].words.is_empty());
        assert!(payload.story.indexes.is_empty());
        assert!(payload.video_url.is_none());
        assert_eq!(payload.story_id().as_deref(), Some("abc"));
    }

    #[test]
    fn test_story_id_fallback() {
        let payload = StoryPayload::from_json(
            r#"{"transcript": {"storyId": "from-transcript"}, "story": {"_id": "  "}}"#,
        )
        .unwrap();
        assert_eq!(payload.story_id().as_deref(), Some("from-transcript"));

        let empty = StoryPayload::from_json("{}").unwrap();
        assert!(empty.story_id().is_none());
    }

    #[test]
    fn test_story_meta_helpers() {
        let payload = StoryPayload::from_json(
            r#"{"story": {"duration": "125.5", "custom_archive_media_type": "audio/mpeg",
                "author": {"full_name": "Ada"}}}"#,
        )
        .unwrap();
        assert!((payload.story.duration_seconds() - 125.5).abs() < f64::EPSILON);
        assert!(payload.story.is_audio());
        assert_eq!(payload.story.publisher(), Some("Ada"));
    }

    #[test]
    fn test_index_parsing() {
        let index: StoryIndex = serde_json::from_value(json!({
            "title": "v2",
            "updated_at": "2024-05-01T00:00:00Z",
            "metadata": [{"title": "Intro", "time": {"start": "12.5", "end": null}}]
        }))
        .unwrap();
        assert_eq!(index.metadata.len(), 1);
        assert!((index.metadata[0].start_seconds() - 12.5).abs() < f64::EPSILON);
        assert!(index.metadata[0].end_seconds().is_none());
    }

    #[test]
    fn test_invalid_json_is_payload_error() {
        let err = StoryPayload::from_json("[1, 2").unwrap_err();
        assert!(matches!(err, crate::Error::Payload(_)));
    }
}
