use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, ChunkMetadata};

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("index not found at '{}'", .0.display())]
    NotFound(PathBuf),
    #[error("dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid index input: {0}")]
    InvalidInput(String),
    #[error("corrupt index: {0}")]
    Corrupt(String),
    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),
}

/// Chunk text plus provenance, as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl From<Chunk> for IndexedChunk {
    fn from(chunk: Chunk) -> Self {
        Self {
            content: chunk.content,
            metadata: chunk.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

/// Read-only nearest-neighbour lookup over an immutable set of embedded chunks.
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimensions(&self) -> usize;

    fn embedding_model(&self) -> &str;

    /// Up to `k` chunks ordered by descending similarity. Ties keep index order.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError::DimensionMismatch`] when `query` has the
    /// wrong length.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorIndexError>;
}
