mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail, ensure};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> anyhow::Result<()> {
        let index = &self.index;
        ensure!(index.chunk_size > 0, "index.chunk_size must be > 0");
        ensure!(
            index.chunk_overlap < index.chunk_size,
            "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
            index.chunk_overlap,
            index.chunk_size
        );
        ensure!(!index.collection.trim().is_empty(), "index.collection must not be empty");
        ensure!(self.retrieval.top_k > 0, "retrieval.top_k must be > 0");

        let router = &self.router;
        ensure!(
            (-1.0..=1.0).contains(&router.similarity_threshold),
            "router.similarity_threshold must be within [-1, 1], got {}",
            router.similarity_threshold
        );
        ensure!(
            router.mixed_band >= 0.0 && router.mixed_band.is_finite(),
            "router.mixed_band must be >= 0, got {}",
            router.mixed_band
        );

        ensure!(self.context.budget_chars > 0, "context.budget_chars must be > 0");
        ensure!(self.llm.timeout_seconds > 0, "llm.timeout_seconds must be > 0");
        ensure!(self.llm.max_tokens > 0, "llm.max_tokens must be > 0");
        ensure!(
            (0.0..=2.0).contains(&self.llm.temperature),
            "llm.temperature must be within [0, 2]"
        );

        if self.llm.provider.needs_api_key() && self.llm.api_key.as_ref().is_none_or(|k| k.is_blank())
        {
            bail!("llm.api_key is required for provider {}", self.llm.provider);
        }

        let embedding = &self.embedding;
        if !embedding.provider.supports_embeddings() {
            bail!(
                "embedding.provider {} has no embeddings endpoint; use ollama or openai",
                embedding.provider
            );
        }
        if embedding.provider.needs_api_key()
            && embedding.api_key.as_ref().is_none_or(|k| k.is_blank())
        {
            bail!("embedding.api_key is required for provider {}", embedding.provider);
        }

        let search = &self.search;
        if search.enabled {
            ensure!(search.max_results > 0, "search.max_results must be > 0");
            ensure!(search.timeout_seconds > 0, "search.timeout_seconds must be > 0");
            if search.provider == SearchProviderKind::SerpApi
                && search.api_key.as_ref().is_none_or(|k| k.is_blank())
            {
                bail!("search.api_key is required for provider serpapi");
            }
        }
        Ok(())
    }
}
