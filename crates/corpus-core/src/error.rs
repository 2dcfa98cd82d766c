//! Error types for the knowledge base core.
//!
//! Per-KB failures are recorded as KB status transitions, not surfaced to
//! callers; these kinds cover the operations that do fail the caller.

use thiserror::Error;

/// Errors produced by the knowledge base core.
#[derive(Debug, Error)]
pub enum KbError {
    /// A registration named an unknown source type or pointed at a path/URL
    /// that cannot be used.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// A reader failed while loading the corpus.
    #[error("reader failed: {0}")]
    ReaderFailed(String),

    /// Rebuilding a vector-store collection failed.
    #[error("index build failed: {0}")]
    IndexBuildFailed(String),

    /// The shared key-value store could not be reached. Callers must not
    /// cache negative results across this failure.
    #[error("status store unavailable: {0}")]
    StoreUnavailable(String),

    /// A vector-store call failed.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// The embedding model call failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The LLM call failed.
    #[error("llm error: {0}")]
    Llm(String),

    /// A value read back from the key-value store did not match the schema.
    #[error("malformed stored value: {0}")]
    Malformed(String),

    /// The addressed knowledge base does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<redis::RedisError> for KbError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Result type alias used throughout the core.
pub type KbResult<T> = Result<T, KbError>;
