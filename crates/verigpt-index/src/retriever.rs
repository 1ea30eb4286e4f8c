//! Top-k semantic retrieval against the live index.

use std::sync::Arc;

use verigpt_llm::LlmProvider;
use verigpt_memory::ScoredChunk;

use crate::error::{IndexError, Result};
use crate::store::IndexHandle;

pub struct Retriever<P: LlmProvider> {
    provider: Arc<P>,
    index: IndexHandle,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, index: IndexHandle) -> Self {
        Self { provider, index }
    }

    #[must_use]
    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Embed `query` and return up to `k` chunks, best first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Unavailable`] without contacting the provider
    /// when no index is loaded, or an error if embedding or search fails.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let index = self.index.current().ok_or(IndexError::Unavailable)?;

        if index.embedding_model() != self.provider.embedding_model() {
            tracing::warn!(
                index_model = index.embedding_model(),
                provider_model = self.provider.embedding_model(),
                "index was built with a different embedding model"
            );
        }

        let vector = self.provider.embed(query).await?;
        let hits = index.search(&vector, k)?;
        tracing::debug!(k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use verigpt_llm::mock::MockProvider;
    use verigpt_memory::{
        ChunkMetadata, DocumentMetadata, FlatIndex, IndexedChunk, VectorIndexError,
    };

    use super::*;

    async fn index_of(provider: &MockProvider, texts: &[&str]) -> FlatIndex {
        let mut items = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let chunk = IndexedChunk {
                content: (*text).to_owned(),
                metadata: ChunkMetadata {
                    document: DocumentMetadata {
                        path: format!("file{i}.sv"),
                        extension: "sv".into(),
                        size: text.len() as u64,
                    },
                    chunk_index: 0,
                    total_chunks: 1,
                    start_byte: 0,
                    end_byte: text.len(),
                    line_start: 1,
                    line_end: 1,
                },
            };
            items.push((chunk, provider.embed(text).await.unwrap()));
        }
        FlatIndex::build(provider.embedding_model(), items).unwrap()
    }

    const TEXTS: [&str; 5] = [
        "module fifo; endmodule",
        "always_ff @(posedge clk) q <= d;",
        "interface axi_if; endinterface",
        "package types_pkg; endpackage",
        "class driver extends uvm_driver;",
    ];

    #[tokio::test]
    async fn no_index_fails_before_embedding() {
        let provider = Arc::new(MockProvider::default());
        let retriever = Retriever::new(Arc::clone(&provider), IndexHandle::new());

        let err = retriever.retrieve("what is a fifo", 3).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable));
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn returns_min_of_k_and_len() {
        let provider = Arc::new(MockProvider::default());
        let index = index_of(&provider, &TEXTS).await;
        let retriever = Retriever::new(
            Arc::clone(&provider),
            IndexHandle::with_index(Arc::new(index)),
        );

        assert_eq!(retriever.retrieve("fifo", 3).await.unwrap().len(), 3);
        assert_eq!(retriever.retrieve("fifo", 10).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn exact_text_ranks_first() {
        let provider = Arc::new(MockProvider::default());
        let index = index_of(&provider, &TEXTS).await;
        let retriever = Retriever::new(
            Arc::clone(&provider),
            IndexHandle::with_index(Arc::new(index)),
        );

        let hits = retriever.retrieve(TEXTS[2], 5).await.unwrap();
        assert_eq!(hits[0].chunk.content, TEXTS[2]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn dimension_mismatch_surfaces() {
        let provider = Arc::new(MockProvider::default());
        let index = index_of(&provider, &TEXTS).await;
        let other = Arc::new(MockProvider::default().with_embedding(vec![1.0, 0.0]));
        let retriever = Retriever::new(other, IndexHandle::with_index(Arc::new(index)));

        let err = retriever.retrieve("fifo", 3).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Vector(VectorIndexError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn embedding_failure_surfaces() {
        let provider = MockProvider::default();
        let index = index_of(&provider, &TEXTS).await;
        let retriever = Retriever::new(
            Arc::new(MockProvider::failing_embeddings()),
            IndexHandle::with_index(Arc::new(index)),
        );

        let err = retriever.retrieve("fifo", 3).await.unwrap_err();
        assert!(matches!(err, IndexError::Llm(_)));
    }
}
