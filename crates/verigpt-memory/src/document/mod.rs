pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::{CorpusEntry, CorpusLoader, CorpusStats, TextLoader};
pub use splitter::{Chunks, SplitterConfig, TextSplitter};
pub use types::{Chunk, ChunkMetadata, Document, DocumentMetadata};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Extensions indexed when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["sv", "svh"];

pub trait DocumentLoader: Send + Sync {
    fn load<'a>(
        &'a self,
        entry: &'a CorpusEntry,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Document, DocumentError>> + Send + 'a>,
    >;
}
