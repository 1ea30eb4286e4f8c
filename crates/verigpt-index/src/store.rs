//! The index currently being served.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use verigpt_memory::{FlatIndex, VectorIndex};

use crate::error::{IndexError, Result};

/// Shared, swappable reference to the live index.
///
/// Readers take an `Arc` snapshot, so a query that started before a reload
/// finishes against the index it began with.
#[derive(Clone, Default)]
pub struct IndexHandle {
    inner: Arc<RwLock<Option<Arc<dyn VectorIndex>>>>,
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("chunks", &self.chunk_count())
            .finish()
    }
}

impl IndexHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_index(index: Arc<dyn VectorIndex>) -> Self {
        let handle = Self::new();
        handle.publish(index);
        handle
    }

    /// Replace the live index, returning the previous one.
    pub fn publish(&self, index: Arc<dyn VectorIndex>) -> Option<Arc<dyn VectorIndex>> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.replace(index)
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<dyn VectorIndex>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    #[must_use]
    pub fn chunk_count(&self) -> Option<usize> {
        self.current().map(|i| i.len())
    }

    /// Load a persisted index from `dir` and publish it.
    ///
    /// On failure the previously published index stays live.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is missing or fails verification.
    pub async fn load_from_disk(&self, dir: &Path) -> Result<usize> {
        let dir = dir.to_path_buf();
        let index = tokio::task::spawn_blocking(move || FlatIndex::load(&dir))
            .await
            .map_err(|e| IndexError::Other(format!("index load task failed: {e}")))??;

        let chunks = index.len();
        tracing::info!(
            chunks,
            dimensions = index.dimensions(),
            model = index.embedding_model(),
            "index loaded"
        );
        self.publish(Arc::new(index));
        Ok(chunks)
    }
}

/// Names of the files in an index directory, sorted. Empty if it does not exist.
#[must_use]
pub fn index_files(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<String> = read_dir
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    files
}

/// Sibling directory used while a new index is written.
pub(crate) fn staging_dir(dir: &Path) -> PathBuf {
    sibling(dir, "staging")
}

pub(crate) fn backup_dir(dir: &Path) -> PathBuf {
    sibling(dir, "previous")
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map_or_else(|| "index".to_owned(), |n| n.to_string_lossy().into_owned());
    dir.with_file_name(format!(".{name}.{suffix}"))
}
