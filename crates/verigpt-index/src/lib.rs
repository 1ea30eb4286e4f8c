//! Corpus indexing and semantic retrieval.
//!
//! [`IndexBuilder`] walks the corpus, chunks and embeds it, and publishes a
//! [`verigpt_memory::FlatIndex`] to disk. [`IndexHandle`] holds the index
//! currently served, and [`Retriever`] answers top-k lookups against it.

pub mod error;
pub mod indexer;
pub mod retriever;
pub mod store;

pub use error::{IndexError, Result};
pub use indexer::{BuildReport, IndexBuilder};
pub use retriever::Retriever;
pub use store::IndexHandle;
