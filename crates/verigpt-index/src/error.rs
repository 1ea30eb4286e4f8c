//! Error types for verigpt-index.

use verigpt_memory::{DocumentError, VectorIndexError};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Corpus walking or reading failed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Index persistence or search failed.
    #[error("vector index error: {0}")]
    Vector(#[from] VectorIndexError),

    /// Embedding request failed.
    #[error("LLM error: {0}")]
    Llm(#[from] verigpt_llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No index has been built or loaded.
    #[error("no index is loaded; run build-index first")]
    Unavailable,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
