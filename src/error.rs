//! Error types for timeslab.
//!
//! The segmentation core never fails: malformed words are dropped and empty
//! input produces empty output. Errors come from configuration, request
//! validation, and the external collaborators (labeler, embedder, store).

/// Errors that can occur while configuring or orchestrating a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is missing, unparseable, or out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The payload carries neither `story._id` nor `transcript.storyId`.
    #[error("missing story id (expected story._id or transcript.storyId)")]
    MissingStoryId,

    /// The request payload is not valid JSON for the expected shape.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The entity labeler failed.
    #[error("labeler error: {0}")]
    Labeler(String),

    /// The entity labeler declined the text (its "could not process" result).
    #[error("labeler could not process text: {0}")]
    Unprocessable(String),

    /// Embedding generation failed.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The embedder returned a different number of vectors than texts.
    #[error("embedder returned {got} vectors for {expected} texts")]
    EmbeddingCountMismatch {
        /// Number of texts sent.
        expected: usize,
        /// Number of vectors received.
        got: usize,
    },

    /// A vector-store operation failed outright.
    #[error("store error: {0}")]
    Store(String),

    /// Some records of a batch insert were rejected.
    #[error("batch insert rejected {} of {total} records", failures.len())]
    BatchInsert {
        /// Number of records submitted.
        total: usize,
        /// Per-record failures.
        failures: Vec<RecordFailure>,
    },
}

/// One rejected record of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Position of the record in the submitted batch.
    pub index: usize,
    /// Reason reported by the store.
    pub message: String,
}

/// Result type for timeslab operations.
pub type Result<T> = std::result::Result<T, Error>;
