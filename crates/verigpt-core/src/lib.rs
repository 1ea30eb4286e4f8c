//! Configuration, secret resolution, prompt templates and the query pipeline.

pub mod config;
pub mod error;
pub mod prompt;
pub mod service;
pub mod vault;

pub use config::Config;
pub use error::ServiceError;
pub use prompt::{Placeholder, PromptBank, PromptError, PromptParams};
pub use service::{QueryAnswer, QueryRequest, QueryService, QueryServiceConfig, QueryStage, Source};
