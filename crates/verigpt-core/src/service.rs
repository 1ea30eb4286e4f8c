//! Query pipeline: validate → retrieve → assemble prompt → generate.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use verigpt_index::{IndexHandle, Retriever};
use verigpt_llm::{LlmProvider, Message};
use verigpt_memory::{ChunkMetadata, ScoredChunk};

use crate::error::ServiceError;
use crate::prompt::{PromptBank, PromptParams};

/// Lifecycle of a single query. `Failed` is reachable from every other stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Received,
    Retrieving,
    Assembling,
    Generating,
    Answered,
    Failed,
}

impl QueryStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Generating => "generating",
            Self::Answered => "answered",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Falls back to [`QueryServiceConfig::default_top_k`] when absent.
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k: Some(top_k),
        }
    }
}

/// One retrieved chunk as reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
    pub score: f32,
}

impl From<&ScoredChunk> for Source {
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            metadata: hit.chunk.metadata.clone(),
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// One entry per retrieved chunk, in retrieval order.
    pub sources: Vec<Source>,
    pub query: String,
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub request_timeout: Duration,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            max_top_k: 50,
            request_timeout: Duration::from_secs(120),
            system_prompt: "agent_main_system".into(),
            user_prompt: "agent_main_user".into(),
        }
    }
}

impl From<&crate::Config> for QueryServiceConfig {
    fn from(config: &crate::Config) -> Self {
        Self {
            default_top_k: config.index.default_top_k,
            max_top_k: config.index.max_top_k,
            request_timeout: config.request_timeout(),
            system_prompt: config.prompts.system.clone(),
            user_prompt: config.prompts.user.clone(),
        }
    }
}

/// Answers questions about the indexed corpus.
///
/// The provider is optional: without a credential the service still reports
/// status, but every query fails with [`ServiceError::Configuration`].
pub struct QueryService<P: LlmProvider> {
    provider: Option<Arc<P>>,
    retriever: Option<Retriever<P>>,
    index: IndexHandle,
    prompts: Arc<PromptBank>,
    config: QueryServiceConfig,
}

impl<P: LlmProvider> QueryService<P> {
    #[must_use]
    pub fn new(
        provider: Option<Arc<P>>,
        index: IndexHandle,
        prompts: Arc<PromptBank>,
        config: QueryServiceConfig,
    ) -> Self {
        let retriever = provider
            .as_ref()
            .map(|p| Retriever::new(Arc::clone(p), index.clone()));
        Self {
            provider,
            retriever,
            index,
            prompts,
            config,
        }
    }

    #[must_use]
    pub fn credentials_configured(&self) -> bool {
        self.provider.is_some()
    }

    #[must_use]
    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    #[must_use]
    pub fn prompts(&self) -> &Arc<PromptBank> {
        &self.prompts
    }

    #[must_use]
    pub fn config(&self) -> &QueryServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.credentials_configured() && self.index.is_loaded()
    }

    /// Run one query through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidRequest`] for an empty query or an
    /// out-of-range `top_k`, [`ServiceError::Configuration`] without a
    /// credential, [`ServiceError::IndexUnavailable`] without an index, and
    /// [`ServiceError::Upstream`] when a provider call fails or the request
    /// exceeds its deadline.
    pub async fn ask(&self, request: QueryRequest) -> Result<QueryAnswer, ServiceError> {
        let mut stage = QueryStage::Received;
        tracing::debug!(stage = stage.as_str(), top_k = ?request.top_k, "query stage");

        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.run(&request, &mut stage),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Upstream(format!(
                "request timed out after {}s",
                self.config.request_timeout.as_secs()
            ))),
        };

        match &result {
            Ok(answer) => tracing::debug!(
                stage = QueryStage::Answered.as_str(),
                sources = answer.sources.len(),
                "query stage"
            ),
            Err(e) => tracing::debug!(
                stage = QueryStage::Failed.as_str(),
                failed_in = stage.as_str(),
                error = %e,
                "query stage"
            ),
        }
        result
    }

    /// Check the request and resolve the number of chunks to retrieve.
    fn validate(&self, request: &QueryRequest) -> Result<usize, ServiceError> {
        if request.query.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "query must not be empty".into(),
            ));
        }
        let top_k = request.top_k.unwrap_or(self.config.default_top_k);
        if top_k == 0 || top_k > self.config.max_top_k {
            return Err(ServiceError::InvalidRequest(format!(
                "top_k must be between 1 and {}",
                self.config.max_top_k
            )));
        }
        Ok(top_k)
    }

    async fn run(
        &self,
        request: &QueryRequest,
        stage: &mut QueryStage,
    ) -> Result<QueryAnswer, ServiceError> {
        let top_k = self.validate(request)?;
        let (Some(provider), Some(retriever)) = (&self.provider, &self.retriever) else {
            return Err(ServiceError::Configuration(
                "OPENAI_API_KEY is not set".into(),
            ));
        };

        advance(stage, QueryStage::Retrieving);
        let hits = retriever.retrieve(&request.query, top_k).await?;

        advance(stage, QueryStage::Assembling);
        let context = hits
            .iter()
            .map(|h| h.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = self
            .prompts
            .render(&self.config.system_prompt, &PromptParams::default())?;
        let user = self.prompts.render(
            &self.config.user_prompt,
            &PromptParams::default()
                .with_context(context)
                .with_query(request.query.clone()),
        )?;
        let messages = [Message::system(system), Message::user(user)];

        advance(stage, QueryStage::Generating);
        let answer = provider.chat(&messages).await?;

        Ok(QueryAnswer {
            answer,
            sources: hits.iter().map(Source::from).collect(),
            query: request.query.clone(),
            top_k,
        })
    }
}

fn advance(stage: &mut QueryStage, next: QueryStage) {
    *stage = next;
    tracing::debug!(stage = next.as_str(), "query stage");
}
