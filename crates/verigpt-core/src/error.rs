use verigpt_index::IndexError;
use verigpt_llm::LlmError;
use verigpt_memory::{DocumentError, VectorIndexError};

use crate::prompt::PromptError;

/// Failure of a service operation, classified for the outer surfaces.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NoFilesFound(String),

    #[error("index is not loaded; build it with `verigpt build-index` or POST /index/reload")]
    IndexUnavailable,

    #[error("{0}")]
    TemplateNotFound(String),

    #[error("{0}")]
    MissingParameter(String),

    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DocumentError> for ServiceError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::NotFound(_) => Self::NotFound(e.to_string()),
            DocumentError::NoFilesFound { .. } => Self::NoFilesFound(e.to_string()),
            DocumentError::InvalidConfig(_) => Self::Configuration(e.to_string()),
            DocumentError::Io(_) | DocumentError::FileTooLarge(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<VectorIndexError> for ServiceError {
    fn from(e: VectorIndexError) -> Self {
        match e {
            VectorIndexError::NotFound(_) => Self::NotFound(e.to_string()),
            _ => Self::Index(e.to_string()),
        }
    }
}

impl From<LlmError> for ServiceError {
    fn from(e: LlmError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<IndexError> for ServiceError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Unavailable => Self::IndexUnavailable,
            IndexError::Document(inner) => inner.into(),
            IndexError::Vector(inner) => inner.into(),
            IndexError::Llm(inner) => inner.into(),
            IndexError::Io(inner) => Self::Index(inner.to_string()),
            IndexError::Other(msg) => Self::Internal(msg),
        }
    }
}

impl From<PromptError> for ServiceError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::TemplateNotFound { .. } => Self::TemplateNotFound(e.to_string()),
            PromptError::MissingParameter(_) => Self::MissingParameter(e.to_string()),
            PromptError::Io { .. } => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn index_errors_classify() {
        assert!(matches!(
            ServiceError::from(IndexError::Unavailable),
            ServiceError::IndexUnavailable
        ));
        assert!(matches!(
            ServiceError::from(IndexError::Llm(LlmError::RateLimited)),
            ServiceError::Upstream(_)
        ));
        assert!(matches!(
            ServiceError::from(IndexError::Document(DocumentError::NotFound(PathBuf::from(
                "data/raw_full"
            )))),
            ServiceError::NotFound(ref m) if m.contains("data/raw_full")
        ));
        assert!(matches!(
            ServiceError::from(IndexError::Vector(VectorIndexError::Corrupt("bad".into()))),
            ServiceError::Index(_)
        ));
        assert!(matches!(
            ServiceError::from(IndexError::Vector(VectorIndexError::NotFound(PathBuf::from("x")))),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn prompt_errors_classify() {
        let missing = PromptError::MissingParameter("context".into());
        assert!(matches!(
            ServiceError::from(missing),
            ServiceError::MissingParameter(ref m) if m.contains("context")
        ));
        let not_found = PromptError::TemplateNotFound {
            name: "agent_main_user".into(),
            dir: PathBuf::from("prompts"),
        };
        assert!(matches!(
            ServiceError::from(not_found),
            ServiceError::TemplateNotFound(_)
        ));
    }

    #[test]
    fn no_files_found_keeps_message() {
        let err = ServiceError::from(DocumentError::NoFilesFound {
            root: PathBuf::from("corpus"),
            extensions: "sv, svh".into(),
        });
        assert!(matches!(err, ServiceError::NoFilesFound(ref m) if m.contains("sv, svh")));
    }
}
