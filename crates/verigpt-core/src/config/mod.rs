mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use verigpt_memory::CorpusLoader;

use crate::vault::{Secret, VaultProvider};

/// Environment variables checked for the OpenAI credential, highest priority first.
pub const OPENAI_KEY_VARS: [&str; 2] = ["VERIGPT_OPENAI_API_KEY", "OPENAI_API_KEY"];

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.chunking
            .validate()
            .context("invalid [chunking] section")?;
        if self.corpus.extensions.iter().all(|e| e.trim().trim_start_matches('.').is_empty()) {
            anyhow::bail!("corpus.extensions must name at least one extension");
        }
        if self.index.max_top_k == 0 {
            anyhow::bail!("index.max_top_k must be at least 1");
        }
        if self.index.default_top_k == 0 || self.index.default_top_k > self.index.max_top_k {
            anyhow::bail!(
                "index.default_top_k must be between 1 and index.max_top_k ({})",
                self.index.max_top_k
            );
        }
        if self.llm.embed_batch_size == 0 {
            anyhow::bail!("llm.embed_batch_size must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be within 0.0..=2.0");
        }
        if self.timeouts.request_secs == 0 || self.timeouts.llm_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    /// Resolve sensitive configuration values through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        for key in OPENAI_KEY_VARS {
            if let Some(val) = vault.get_secret(key).await? {
                self.secrets.openai_api_key = Some(Secret::new(val));
                break;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn credentials_configured(&self) -> bool {
        self.secrets.openai_api_key.is_some()
    }

    #[must_use]
    pub fn corpus_loader(&self) -> CorpusLoader {
        CorpusLoader::new(&self.corpus.dir, &self.corpus.extensions)
            .with_max_file_size(self.corpus.max_file_size)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request_secs)
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.llm_secs)
    }
}
