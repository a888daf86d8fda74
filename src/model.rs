//! Model-backed collaborators.
//!
//! Sentence detection, entity labeling, and embedding are delegated to
//! external models. Each is a trait so different backends (a rule-based
//! segmenter, a GLiNER service, fastembed, a remote API) can be injected.
//! Model loading and lifecycle belong to the implementor; the core only
//! holds a shared reference.

use std::ops::Range;

use crate::entity::Entity;
use crate::Result;

/// Splits text into sentences.
pub trait SentenceSegmenter: Send + Sync {
    /// Sentence spans as byte ranges into `text`.
    ///
    /// Spans must be non-overlapping and in increasing order. They may omit
    /// inter-sentence whitespace.
    fn segment(&self, text: &str) -> Vec<Range<usize>>;
}

/// Finds labeled entity spans in text.
pub trait EntityLabeler: Send + Sync {
    /// Label entities in `text` using the given label set.
    ///
    /// Entity offsets are byte offsets into `text`. Backends that report
    /// character offsets convert them with
    /// [`char_to_byte_offset`](crate::char_to_byte_offset). Zero entities is
    /// a valid result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unprocessable`](crate::Error::Unprocessable) when the
    /// model declines the input, or [`Error::Labeler`](crate::Error::Labeler)
    /// for any other failure. Implementations must not return corrupted
    /// spans in place of an error.
    fn label(&self, text: &str, labels: &[String], threshold: f32) -> Result<Vec<Entity>>;
}

/// Produces one fixed-length vector per input text.
pub trait Embedder: Send + Sync {
    /// Encode `texts`, returning vectors in input order.
    ///
    /// Empty input yields empty output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`](crate::Error::Embedding) when the model
    /// fails.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Whitespace;

    impl SentenceSegmenter for Whitespace {
        fn segment(&self, text: &str) -> Vec<Range<usize>> {
            if text.is_empty() {
                vec![]
            } else {
                vec![0..text.len()]
            }
        }
    }

    #[test]
    fn test_trait_objects_are_shareable() {
        let segmenter: Arc<dyn SentenceSegmenter> = Arc::new(Whitespace);
        let clone = Arc::clone(&segmenter);
        assert_eq!(clone.segment("a b"), vec![0..3]);
        assert!(segmenter.segment("").is_empty());
    }
}
