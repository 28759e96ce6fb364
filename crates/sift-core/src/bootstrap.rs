//! Construction of providers, stores and the engine from [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use sift_llm::any::AnyProvider;
use sift_llm::ollama::OllamaProvider;
use sift_llm::openai::OpenAiProvider;
use sift_memory::document::{IngestionPipeline, SplitterConfig, TextSplitter};
use sift_memory::{
    ChunkIndex, ChunkRegistry, InMemoryVectorStore, IndexOptions, QdrantOps, SqliteStore,
    SqliteVectorStore, VectorStore,
};
use sift_search::AnySearchProvider;
use sift_search::duckduckgo::DuckDuckGoProvider;
use sift_search::serpapi::SerpApiProvider;

use crate::answer::AnswerGenerator;
use crate::config::{Config, IndexBackend, ProviderKind, SearchProviderKind};
use crate::engine::{EngineSettings, RagEngine};
use crate::secret::Secret;

fn api_key(key: Option<&Secret>, section: &str) -> anyhow::Result<String> {
    key.filter(|k| !k.is_blank())
        .map(|k| k.expose().to_owned())
        .with_context(|| format!("{section}.api_key is not set"))
}

/// Chat model used for answer generation.
///
/// # Errors
///
/// Returns an error if a hosted provider has no API key.
pub fn create_llm_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    let provider = match llm.provider {
        ProviderKind::Ollama => AnyProvider::Ollama(OllamaProvider::new(
            llm.base_url(),
            llm.model().to_owned(),
            config.embedding.model().unwrap_or_default().to_owned(),
        )),
        ProviderKind::OpenAi | ProviderKind::Groq => AnyProvider::OpenAi(OpenAiProvider::new(
            api_key(llm.api_key.as_ref(), "llm")?,
            llm.base_url().to_owned(),
            llm.model().to_owned(),
            llm.max_tokens,
            llm.temperature,
            None,
        )),
    };
    tracing::debug!(provider = %llm.provider, model = llm.model(), "chat provider ready");
    Ok(provider)
}

/// Model used to embed chunks and queries.
///
/// # Errors
///
/// Returns an error for providers without embeddings or a missing API key.
pub fn create_embedding_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let embedding = &config.embedding;
    let Some(model) = embedding.model() else {
        bail!("embedding provider {} has no embeddings endpoint", embedding.provider);
    };
    let provider = match embedding.provider {
        ProviderKind::Ollama => AnyProvider::Ollama(OllamaProvider::new(
            embedding.base_url(),
            config.llm.model().to_owned(),
            model.to_owned(),
        )),
        ProviderKind::OpenAi => AnyProvider::OpenAi(OpenAiProvider::new(
            api_key(embedding.api_key.as_ref(), "embedding")?,
            embedding.base_url().to_owned(),
            config.llm.model().to_owned(),
            config.llm.max_tokens,
            config.llm.temperature,
            Some(model.to_owned()),
        )),
        ProviderKind::Groq => {
            bail!("embedding provider groq has no embeddings endpoint")
        }
    };
    Ok(provider)
}

/// Web search provider, `None` when search is disabled.
///
/// # Errors
///
/// Returns an error if `SerpAPI` is selected without a key.
pub fn create_search_provider(config: &Config) -> anyhow::Result<Option<AnySearchProvider>> {
    let search = &config.search;
    if !search.enabled {
        tracing::info!("web search disabled");
        return Ok(None);
    }
    let client = sift_llm::http::client_with_timeout(Duration::from_secs(search.timeout_seconds));
    let provider = match search.provider {
        SearchProviderKind::SerpApi => AnySearchProvider::SerpApi(
            SerpApiProvider::new(
                client,
                api_key(search.api_key.as_ref(), "search")?,
                search.base_url.clone(),
            )
            .context("failed to create SerpAPI provider")?,
        ),
        SearchProviderKind::DuckDuckGo => {
            AnySearchProvider::DuckDuckGo(DuckDuckGoProvider::new(client, search.base_url.clone()))
        }
    };
    Ok(Some(provider))
}

fn registry_path(config: &Config) -> &str {
    match config.index.backend {
        IndexBackend::Memory => ":memory:",
        IndexBackend::Sqlite | IndexBackend::Qdrant => config.index.sqlite_path.as_str(),
    }
}

fn create_vector_store(config: &Config, db: &SqliteStore) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.index.backend {
        IndexBackend::Sqlite => Arc::new(SqliteVectorStore::new(db.pool().clone())),
        IndexBackend::Qdrant => Arc::new(
            QdrantOps::new(&config.index.qdrant_url)
                .map_err(|e| anyhow!("failed to create Qdrant client: {e}"))?,
        ),
        IndexBackend::Memory => Arc::new(InMemoryVectorStore::new()),
    };
    Ok(store)
}

/// Open the chunk registry and vector store and wire them to `embedder`.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened or the vector
/// store client cannot be created.
pub async fn build_index(config: &Config, embedder: &AnyProvider) -> anyhow::Result<Arc<ChunkIndex>> {
    let index = &config.index;
    let db = SqliteStore::new(registry_path(config))
        .await
        .with_context(|| format!("failed to open index database {}", registry_path(config)))?;
    let store = create_vector_store(config, &db)?;

    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: index.chunk_size,
        chunk_overlap: index.chunk_overlap,
        sentence_aware: index.sentence_aware,
    });
    let pipeline = IngestionPipeline::new(splitter, Box::new(embedder.embed_fn()));
    let options = IndexOptions {
        collection: index.collection.clone(),
        embedding_model: format!(
            "{}/{}",
            config.embedding.provider,
            config.embedding.model().unwrap_or_default()
        ),
        max_retries: index.max_retries,
        ..IndexOptions::default()
    };
    tracing::debug!(backend = ?index.backend, collection = %index.collection, "index ready");
    Ok(Arc::new(ChunkIndex::new(
        store,
        ChunkRegistry::new(db.pool().clone()),
        pipeline,
        options,
    )))
}

/// Build the full query engine from configuration.
///
/// # Errors
///
/// Returns an error if any provider or store cannot be created.
pub async fn build_engine(config: &Config) -> anyhow::Result<RagEngine<AnyProvider, AnySearchProvider>> {
    let embedder = create_embedding_provider(config)?;
    let index = build_index(config, &embedder).await?;
    let llm = create_llm_provider(config)?;
    let search = create_search_provider(config)?;
    let generator = AnswerGenerator::new(
        llm,
        config.answer.system_prompt.clone(),
        Duration::from_secs(config.llm.timeout_seconds),
    );
    Ok(RagEngine::new(
        index,
        generator,
        search,
        EngineSettings::from_config(config),
    ))
}
