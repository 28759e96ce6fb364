use super::{Config, IndexBackend, ProviderKind, SearchProviderKind};
use crate::secret::Secret;

fn parse_kind<T: serde::de::DeserializeOwned>(var: &str, value: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(value.to_owned())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {var} value: {value}");
    }
    parsed
}

fn parsed_var<T: std::str::FromStr>(var: &str) -> Option<T> {
    let value = std::env::var(var).ok()?;
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {var} value: {value}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_models();
        self.apply_env_overrides_engine();
    }

    fn apply_env_overrides_models(&mut self) {
        if let Ok(v) = std::env::var("SIFT_LLM_PROVIDER")
            && let Some(kind) = parse_kind::<ProviderKind>("SIFT_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("SIFT_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("SIFT_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("SIFT_LLM_API_KEY") {
            self.llm.api_key = Some(Secret::new(v));
        }
        if let Some(v) = parsed_var::<f32>("SIFT_LLM_TEMPERATURE") {
            self.llm.temperature = v;
        }
        if let Some(v) = parsed_var::<u64>("SIFT_LLM_TIMEOUT") {
            self.llm.timeout_seconds = v;
        }

        if let Ok(v) = std::env::var("SIFT_EMBEDDING_PROVIDER")
            && let Some(kind) = parse_kind::<ProviderKind>("SIFT_EMBEDDING_PROVIDER", &v)
        {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("SIFT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("SIFT_EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Ok(v) = std::env::var("SIFT_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(Secret::new(v));
        }
    }

    fn apply_env_overrides_engine(&mut self) {
        if let Ok(v) = std::env::var("SIFT_INDEX_BACKEND")
            && let Some(backend) = parse_kind::<IndexBackend>("SIFT_INDEX_BACKEND", &v)
        {
            self.index.backend = backend;
        }
        if let Ok(v) = std::env::var("SIFT_SQLITE_PATH") {
            self.index.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("SIFT_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Some(v) = parsed_var::<usize>("SIFT_CHUNK_SIZE") {
            self.index.chunk_size = v;
        }
        if let Some(v) = parsed_var::<usize>("SIFT_CHUNK_OVERLAP") {
            self.index.chunk_overlap = v;
        }
        if let Some(v) = parsed_var::<usize>("SIFT_TOP_K") {
            self.retrieval.top_k = v;
        }
        if let Some(v) = parsed_var::<f32>("SIFT_SIMILARITY_THRESHOLD") {
            self.router.similarity_threshold = v;
        }
        if let Some(v) = parsed_var::<f32>("SIFT_MIXED_BAND") {
            self.router.mixed_band = v;
        }
        if let Some(v) = parsed_var::<usize>("SIFT_CONTEXT_BUDGET") {
            self.context.budget_chars = v;
        }

        if let Some(v) = parsed_var::<bool>("SIFT_SEARCH_ENABLED") {
            self.search.enabled = v;
        }
        if let Ok(v) = std::env::var("SIFT_SEARCH_PROVIDER")
            && let Some(kind) = parse_kind::<SearchProviderKind>("SIFT_SEARCH_PROVIDER", &v)
        {
            self.search.provider = kind;
        }
        if let Ok(v) = std::env::var("SIFT_SEARCH_API_KEY") {
            self.search.api_key = Some(Secret::new(v));
        }
        if let Some(v) = parsed_var::<usize>("SIFT_SEARCH_MAX_RESULTS") {
            self.search.max_results = v;
        }
        if let Some(v) = parsed_var::<u64>("SIFT_SEARCH_TIMEOUT") {
            self.search.timeout_seconds = v;
        }
        if let Ok(v) = std::env::var("SIFT_SYSTEM_PROMPT") {
            self.answer.system_prompt = v;
        }
    }
}
