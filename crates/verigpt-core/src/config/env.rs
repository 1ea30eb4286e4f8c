use std::path::PathBuf;

use super::Config;

fn parse_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_paths();
        self.apply_env_overrides_llm();
        self.apply_env_overrides_limits();
    }

    fn apply_env_overrides_paths(&mut self) {
        if let Ok(v) = std::env::var("VERIGPT_CORPUS_DIR") {
            self.corpus.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VERIGPT_CORPUS_EXTENSIONS") {
            let list = parse_list(&v);
            if list.is_empty() {
                tracing::warn!("ignoring empty VERIGPT_CORPUS_EXTENSIONS");
            } else {
                self.corpus.extensions = list;
            }
        }
        if let Ok(v) = std::env::var("VERIGPT_INDEX_PATH") {
            self.index.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VERIGPT_PROMPTS_DIR") {
            self.prompts.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VERIGPT_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("VERIGPT_GATEWAY_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.gateway.port = port;
            } else {
                tracing::warn!("ignoring invalid VERIGPT_GATEWAY_PORT value: {v}");
            }
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("VERIGPT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("VERIGPT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("VERIGPT_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("VERIGPT_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("VERIGPT_LLM_MAX_RETRIES")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_retries = n;
        }
    }

    fn apply_env_overrides_limits(&mut self) {
        if let Ok(v) = std::env::var("VERIGPT_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_size = n;
        }
        if let Ok(v) = std::env::var("VERIGPT_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("VERIGPT_INDEX_MAX_TOP_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.max_top_k = n;
        }
        if let Ok(v) = std::env::var("VERIGPT_TIMEOUT_REQUEST")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.request_secs = secs;
        }
        if let Ok(v) = std::env::var("VERIGPT_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_secs = secs;
        }
    }
}
