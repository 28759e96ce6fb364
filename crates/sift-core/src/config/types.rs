use serde::{Deserialize, Serialize};

use crate::answer::ResponseMode;
use crate::secret::Secret;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
}

/// Model provider backend selector, shared by `[llm]` and `[embedding]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Groq,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
        }
    }

    #[must_use]
    pub fn needs_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    #[must_use]
    pub fn supports_embeddings(self) -> bool {
        !matches!(self, Self::Groq)
    }

    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => sift_llm::openai::GROQ_BASE_URL,
        }
    }

    #[must_use]
    pub fn default_chat_model(self) -> &'static str {
        match self {
            Self::Ollama => "llama3.1:8b",
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.1-8b-instant",
        }
    }

    /// `None` for providers without an embeddings endpoint.
    #[must_use]
    pub fn default_embedding_model(self) -> Option<&'static str> {
        match self {
            Self::Ollama => Some("nomic-embed-text"),
            Self::OpenAi => Some("text-embedding-3-small"),
            Self::Groq => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Defaults to the provider's public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<Secret>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<Secret>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: None,
            api_key: None,
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_chat_model())
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Configured model, else the provider default. `None` only for providers
    /// that cannot embed.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or_else(|| self.provider.default_embedding_model())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Sqlite,
    Qdrant,
    Memory,
}

fn default_backend() -> IndexBackend {
    IndexBackend::Sqlite
}

fn default_sqlite_path() -> String {
    "./data/sift.db".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "sift_documents".into()
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_index_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: IndexBackend,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub sentence_aware: bool,
    #[serde(default = "default_index_retries")]
    pub max_retries: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            sentence_aware: true,
            max_retries: default_index_retries(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.75
}

fn default_mixed_band() -> f32 {
    0.15
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RouterConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Width of the score band below the threshold that blends documents and web.
    #[serde(default = "default_mixed_band")]
    pub mixed_band: f32,
}

impl RouterConfig {
    /// Lowest score a chunk may have to be kept in a documents or mixed context.
    #[must_use]
    pub fn blend_floor(&self) -> f32 {
        self.similarity_threshold - self.mixed_band
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            mixed_band: default_mixed_band(),
        }
    }
}

fn default_budget_chars() -> usize {
    6000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_chars: default_budget_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    SerpApi,
    DuckDuckGo,
}

impl SearchProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SerpApi => "serpapi",
            Self::DuckDuckGo => "duckduckgo",
        }
    }
}

fn default_search_provider() -> SearchProviderKind {
    SearchProviderKind::DuckDuckGo
}

fn default_max_results() -> usize {
    3
}

fn default_search_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_provider")]
    pub provider: SearchProviderKind,
    #[serde(default, skip_serializing)]
    pub api_key: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_search_provider(),
            api_key: None,
            base_url: None,
            max_results: default_max_results(),
            timeout_seconds: default_search_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    #[serde(default)]
    pub default_mode: ResponseMode,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_true")]
    pub allow_general_knowledge: bool,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            default_mode: ResponseMode::default(),
            system_prompt: String::new(),
            allow_general_knowledge: true,
        }
    }
}
