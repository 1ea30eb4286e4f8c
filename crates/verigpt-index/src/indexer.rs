//! Index build: walk → chunk → embed → persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use verigpt_llm::LlmProvider;
use verigpt_memory::{
    CorpusLoader, DocumentError, FlatIndex, IndexedChunk, TextSplitter, VectorIndex,
};

use crate::error::{IndexError, Result};
use crate::store::{backup_dir, staging_dir};

/// Summary of a build run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub files_indexed: usize,
    pub chunks: usize,
    pub dimensions: usize,
    pub embedding_model: String,
    pub index_path: PathBuf,
    pub duration_ms: u64,
}

/// Builds a [`FlatIndex`] from a corpus and publishes it atomically.
pub struct IndexBuilder<P: LlmProvider> {
    provider: Arc<P>,
    splitter: TextSplitter,
}

impl<P: LlmProvider> IndexBuilder<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, splitter: TextSplitter) -> Self {
        Self { provider, splitter }
    }

    /// Build the index and write it to `index_dir`.
    ///
    /// The new index is written to a staging sibling first and renamed into
    /// place, so a failed build leaves any previous index untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the corpus is missing or yields no chunks, if an
    /// embedding request fails, or if the index cannot be persisted.
    pub async fn build(
        &self,
        corpus: &CorpusLoader,
        index_dir: &Path,
    ) -> Result<(FlatIndex, BuildReport)> {
        let start = std::time::Instant::now();

        let documents = corpus.load().await?;
        let chunks: Vec<IndexedChunk> = documents
            .iter()
            .flat_map(|doc| self.splitter.split(doc))
            .map(IndexedChunk::from)
            .collect();

        if chunks.is_empty() {
            return Err(DocumentError::NoFilesFound {
                root: corpus.root().to_path_buf(),
                extensions: corpus.extensions().join(", "),
            }
            .into());
        }

        tracing::info!(
            files = documents.len(),
            chunks = chunks.len(),
            "embedding corpus chunks"
        );

        let vectors = self.embed_all(&chunks).await?;
        let index = FlatIndex::build(
            self.provider.embedding_model(),
            chunks.into_iter().zip(vectors).collect(),
        )?;

        let index = persist(index, index_dir).await?;

        let report = BuildReport {
            files_indexed: documents.len(),
            chunks: index.len(),
            dimensions: index.dimensions(),
            embedding_model: index.embedding_model().to_owned(),
            index_path: index_dir.to_path_buf(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::info!(
            files = report.files_indexed,
            chunks = report.chunks,
            duration_ms = report.duration_ms,
            path = %index_dir.display(),
            "index build complete"
        );

        Ok((index, report))
    }

    async fn embed_all(&self, chunks: &[IndexedChunk]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.provider.embed_batch_size().max(1);
        let mut vectors = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self.provider.embed_batch(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(verigpt_llm::LlmError::EmbeddingCountMismatch {
                    expected: texts.len(),
                    actual: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
            tracing::debug!(
                batch = batch_no + 1,
                embedded = vectors.len(),
                total = chunks.len(),
                "embedding progress"
            );
        }

        Ok(vectors)
    }
}

/// Write `index` under `index_dir` via a staging directory and rename.
async fn persist(index: FlatIndex, index_dir: &Path) -> Result<FlatIndex> {
    let dir = index_dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<FlatIndex> {
        let staging = staging_dir(&dir);
        let backup = backup_dir(&dir);

        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        if let Some(parent) = staging.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if let Err(e) = index.save(&staging) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        if dir.exists() {
            if backup.exists() {
                std::fs::remove_dir_all(&backup)?;
            }
            std::fs::rename(&dir, &backup)?;
        }
        if let Err(e) = std::fs::rename(&staging, &dir) {
            restore_backup(&backup, &dir);
            return Err(e.into());
        }
        if backup.exists() {
            std::fs::remove_dir_all(&backup)?;
        }
        Ok(index)
    })
    .await
    .map_err(|e| IndexError::Other(format!("index write task failed: {e}")))?
}

/// Move a previous index back into place after a failed publish.
fn restore_backup(backup: &Path, dir: &Path) {
    if !backup.exists() {
        return;
    }
    if let Err(e) = std::fs::rename(backup, dir) {
        tracing::error!(
            backup = %backup.display(),
            path = %dir.display(),
            "failed to restore previous index: {e}; no index is live at the configured path"
        );
    }
}
