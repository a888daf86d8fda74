//! Local embedding backend.
//!
//! [`FastEmbedder`] runs a fastembed ONNX model in-process. The model is
//! loaded once, at construction, and the embedder is then shared by
//! reference with every [`StoryProcessor`](crate::StoryProcessor) that needs
//! it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use timeslab::{Config, Embedder, FastEmbedder, StoryProcessor};
//!
//! // Uses fastembed's default model (BGE-small-en, 384 dimensions)
//! let config = Config::default();
//! let embedder = Arc::new(FastEmbedder::from_config(&config)?);
//! let vectors = embedder.encode(&["We moved to Detroit in 1952.".to_string()])?;
//! assert_eq!(vectors[0].len(), 384);
//!
//! let processor = StoryProcessor::new(config, embedder)?;
//! ```

use crate::model::Embedder;
use crate::{Config, Error, Result};

/// An [`Embedder`] backed by `fastembed`.
pub struct FastEmbedder {
    model: fastembed::TextEmbedding,
    batch_size: usize,
}

impl FastEmbedder {
    /// Load fastembed's default model.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Texts per forward pass (0 is treated as 1)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] if the model fails to load.
    pub fn new(batch_size: usize) -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| Error::Embedding(e.to_string()))?;

        Ok(Self {
            model,
            batch_size: batch_size.max(1),
        })
    }

    /// Load the default model with `config.embedding_batch_size`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Embedding`] if the model fails to load.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.embedding_batch_size)
    }
}

impl Embedder for FastEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
