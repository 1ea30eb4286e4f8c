//! Source corpus loading, overlapping chunking, and the flat vector index.

pub mod document;
pub mod flat_index;
pub mod vector_store;

pub use document::{
    Chunk, ChunkMetadata, CorpusEntry, CorpusLoader, CorpusStats, Document, DocumentError,
    DocumentMetadata, SplitterConfig, TextSplitter,
};
pub use flat_index::FlatIndex;
pub use vector_store::{IndexedChunk, ScoredChunk, VectorIndex, VectorIndexError};
