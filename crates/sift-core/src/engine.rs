//! End-to-end query flow: retrieve, route, search, assemble, generate.

use std::sync::Arc;
use std::time::Duration;

use sift_llm::retry::with_backoff;
use sift_llm::{LlmProvider, Message};
use sift_memory::{ChunkIndex, MemoryError, ScoredChunk};
use sift_search::{SearchError, SearchProvider, WebSnippet};

use crate::answer::{Answer, AnswerGenerator, ResponseMode};
use crate::config::{Config, RouterConfig};
use crate::context::{ContextBlock, assemble};
use crate::error::EngineError;
use crate::retriever::{Retriever, top_score};
use crate::router::{Route, RouteDecision, SourceAvailability, plan_route, select_chunks, settle_route};

/// Per-query knobs taken from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub top_k: usize,
    pub router: RouterConfig,
    pub budget_chars: usize,
    pub max_results: usize,
    pub search_timeout: Duration,
    pub allow_general_knowledge: bool,
    pub retry_base: Duration,
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            router: config.router,
            budget_chars: config.context.budget_chars,
            max_results: config.search.max_results,
            search_timeout: Duration::from_secs(config.search.timeout_seconds),
            allow_general_knowledge: config.answer.allow_general_knowledge,
            retry_base: Duration::from_millis(500),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub force_web_search: bool,
    pub mode: ResponseMode,
    pub history: Vec<Message>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            force_web_search: false,
            mode: ResponseMode::default(),
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_web_search(mut self, force: bool) -> Self {
        self.force_web_search = force;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// Routing outcome and the context it produced, before generation.
#[derive(Debug, Clone)]
pub struct RoutedContext {
    pub route: Route,
    pub decision: RouteDecision,
    pub top_score: Option<f32>,
    pub context: ContextBlock,
}

pub struct RagEngine<P, S> {
    retriever: Retriever,
    web: Option<S>,
    generator: AnswerGenerator<P>,
    settings: EngineSettings,
}

impl<P, S> std::fmt::Debug for RagEngine<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("settings", &self.settings)
            .field("web_search", &self.web.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider, S: SearchProvider> RagEngine<P, S> {
    /// `web` is `None` when web search is disabled.
    #[must_use]
    pub fn new(
        index: Arc<ChunkIndex>,
        generator: AnswerGenerator<P>,
        web: Option<S>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            retriever: Retriever::new(index),
            web,
            generator,
            settings,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<ChunkIndex> {
        self.retriever.index()
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Answer one query.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoContextAvailable`] when no source produced context
    /// and general-knowledge answers are disabled, or [`EngineError::Generation`]
    /// when the model keeps failing.
    pub async fn ask(&self, request: &QueryRequest) -> Result<Answer, EngineError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery);
        }
        let routed = self.route(query, request.force_web_search).await?;
        let answer = self
            .generator
            .generate(
                query,
                &routed.context,
                routed.decision,
                request.mode,
                &request.history,
            )
            .await
            .map_err(|e| {
                tracing::error!("answer generation failed: {e}");
                EngineError::Generation(e)
            })?;
        tracing::info!(
            decision = ?routed.decision,
            mode = %request.mode,
            segments = routed.context.segments().len(),
            "query answered"
        );
        Ok(answer)
    }

    /// Gather and assemble context for `query` without calling the model.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoContextAvailable`] (or the index error that left
    /// documents unavailable) when the decision settles on `Failed`, and
    /// [`EngineError::Index`] for an embedding model mismatch.
    pub async fn route(&self, query: &str, force_web_search: bool) -> Result<RoutedContext, EngineError> {
        let k = self.settings.top_k;
        let (retrieved, early_web) = if force_web_search {
            let (retrieved, web) = tokio::join!(self.retriever.retrieve(query, k), self.search_web(query));
            (retrieved, Some(web))
        } else {
            (self.retriever.retrieve(query, k).await, None)
        };

        let (hits, retrieval_error) = match retrieved {
            Ok(hits) => (hits, None),
            Err(e @ MemoryError::EmbeddingMismatch { .. }) => return Err(EngineError::Index(e)),
            Err(e) => {
                tracing::warn!("document retrieval unavailable: {e}");
                (Vec::new(), Some(e))
            }
        };

        let top = top_score(&hits);
        let route = plan_route(top, force_web_search, &self.settings.router);
        tracing::debug!(?top, ?route, force_web_search, "route planned");

        let snippets = match early_web {
            Some(web) => web,
            None if route.needs_web() => self.search_web(query).await,
            None => None,
        }
        .unwrap_or_default();

        let available = SourceAvailability {
            documents: !hits.is_empty(),
            web: !snippets.is_empty(),
        };
        let decision = settle_route(route, available, self.settings.allow_general_knowledge);
        if decision == RouteDecision::Failed {
            tracing::error!(?route, "no context available");
            return Err(retrieval_error.map_or(EngineError::NoContextAvailable, EngineError::Index));
        }
        if route.needs_web() && !decision.uses_web() {
            tracing::warn!(?route, ?decision, "web context unavailable, falling back");
        }

        let chunks: Vec<ScoredChunk> = select_chunks(route, decision, hits, &self.settings.router);
        let web: &[WebSnippet] = if decision.uses_web() { &snippets } else { &[] };
        let context = assemble(&chunks, web, self.settings.budget_chars);
        tracing::debug!(
            ?decision,
            chunks = chunks.len(),
            snippets = web.len(),
            segments = context.segments().len(),
            "context ready"
        );
        Ok(RoutedContext {
            route,
            decision,
            top_score: top,
            context,
        })
    }

    /// Snippets for `query`, or `None` when search is disabled or failed after one retry.
    async fn search_web(&self, query: &str) -> Option<Vec<WebSnippet>> {
        let provider = self.web.as_ref()?;
        let timeout = self.settings.search_timeout;
        let max_results = self.settings.max_results;

        let result = with_backoff(
            "web search",
            1,
            self.settings.retry_base,
            SearchError::is_transient,
            move || async move {
                tokio::time::timeout(timeout, provider.search(query, max_results))
                    .await
                    .unwrap_or_else(|_| {
                        Err(SearchError::Timeout {
                            seconds: timeout.as_secs(),
                        })
                    })
            },
        )
        .await;

        match result {
            Ok(mut snippets) => {
                snippets.truncate(max_results);
                tracing::debug!(provider = provider.name(), count = snippets.len(), "web search complete");
                Some(snippets)
            }
            Err(e) => {
                tracing::warn!(provider = provider.name(), "web search unavailable: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sift_llm::mock::MockProvider;
    use sift_memory::document::Document;
    use sift_search::mock::MockSearchProvider;

    use super::*;
    use crate::context::Provenance;
    use crate::testing::keyword_index;

    const POLICY: &str = "Refunds are issued within 30 days of purchase. \
                          Shipping is free for orders over fifty dollars.";

    fn settings() -> EngineSettings {
        EngineSettings {
            search_timeout: Duration::from_millis(100),
            retry_base: Duration::from_millis(1),
            ..EngineSettings::default()
        }
    }

    fn weather() -> MockSearchProvider {
        MockSearchProvider::with_excerpts(&[
            ("Paris forecast", "https://w.example/paris", "Sunny, high of 21C."),
            ("Paris radar", "https://r.example/paris", "No rain expected today."),
        ])
    }

    async fn engine(
        llm: MockProvider,
        web: Option<MockSearchProvider>,
        settings: EngineSettings,
    ) -> RagEngine<MockProvider, MockSearchProvider> {
        let index = keyword_index().await;
        index.ingest(Document::text("policy", POLICY)).await.unwrap();
        let generator = AnswerGenerator::new(llm, String::new(), Duration::from_secs(5))
            .with_retry_base(Duration::from_millis(1));
        RagEngine::new(index, generator, web, settings)
    }

    #[tokio::test]
    async fn high_score_routes_to_documents_without_search() {
        let web = weather();
        let e = engine(MockProvider::default(), Some(web.clone()), settings()).await;
        let routed = e.route("refund window?", false).await.unwrap();
        assert_eq!(routed.decision, RouteDecision::DocumentsOnly);
        assert!(routed.context.contains(Provenance::Document));
        assert!(!routed.context.contains(Provenance::Web));
        assert!(web.queries().is_empty());
    }

    #[tokio::test]
    async fn forced_web_search_overrides_score() {
        let web = weather();
        let e = engine(MockProvider::default(), Some(web.clone()), settings()).await;
        let routed = e.route("refund window?", true).await.unwrap();
        assert_eq!(routed.route, Route::WebOnly);
        assert_eq!(routed.decision, RouteDecision::WebOnly);
        assert_eq!(web.queries().len(), 1);
    }

    #[tokio::test]
    async fn forced_web_failure_falls_back_to_any_document() {
        let e = engine(
            MockProvider::default(),
            Some(MockSearchProvider::failing()),
            settings(),
        )
        .await;
        let routed = e.route("weather today", true).await.unwrap();
        assert_eq!(routed.decision, RouteDecision::DocumentsOnly);
        assert!(!routed.context.is_empty());
    }

    #[tokio::test]
    async fn search_timeout_is_a_source_failure() {
        let slow = weather().with_delay(500);
        let e = engine(MockProvider::default(), Some(slow.clone()), settings()).await;
        let routed = e.route("weather today", false).await.unwrap();
        assert_eq!(routed.route, Route::WebOnly);
        assert_eq!(routed.decision, RouteDecision::DocumentsOnly);
        assert_eq!(slow.queries().len(), 2);
    }

    #[tokio::test]
    async fn transient_search_failure_is_retried() {
        let web = weather().with_transient_failures(1);
        let e = engine(MockProvider::default(), Some(web.clone()), settings()).await;
        let routed = e.route("weather today", false).await.unwrap();
        assert_eq!(routed.decision, RouteDecision::WebOnly);
        assert_eq!(web.queries().len(), 2);
    }

    #[tokio::test]
    async fn mixed_band_blends_documents_and_web() {
        let index = keyword_index().await;
        index
            .ingest(Document::text("faq", "Refund and shipping questions."))
            .await
            .unwrap();
        let generator = AnswerGenerator::new(MockProvider::default(), String::new(), Duration::from_secs(5));
        let e = RagEngine::new(index, generator, Some(weather()), settings());
        let routed = e.route("refund", false).await.unwrap();
        assert_eq!(routed.route, Route::Mixed);
        assert_eq!(routed.decision, RouteDecision::Mixed);
        assert!(routed.context.contains(Provenance::Document));
        assert!(routed.context.contains(Provenance::Web));
    }

    #[tokio::test]
    async fn empty_index_without_web_uses_general_knowledge() {
        let index = keyword_index().await;
        let generator = AnswerGenerator::new(
            MockProvider::with_responses(vec!["From general knowledge.".into()]),
            String::new(),
            Duration::from_secs(5),
        );
        let e: RagEngine<MockProvider, MockSearchProvider> =
            RagEngine::new(index, generator, None, settings());
        let answer = e.ask(&QueryRequest::new("who wrote hamlet?")).await.unwrap();
        assert_eq!(answer.decision, RouteDecision::GeneralKnowledge);
        assert!(answer.provenance.is_empty());
    }

    #[tokio::test]
    async fn no_context_is_an_error_when_general_knowledge_disabled() {
        let index = keyword_index().await;
        let generator = AnswerGenerator::new(MockProvider::default(), String::new(), Duration::from_secs(5));
        let settings = EngineSettings {
            allow_general_knowledge: false,
            ..settings()
        };
        let e = RagEngine::new(index, generator, Some(MockSearchProvider::failing()), settings);
        let err = e.ask(&QueryRequest::new("anything")).await.unwrap_err();
        assert!(matches!(err, EngineError::NoContextAvailable));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let e = engine(MockProvider::default(), None, settings()).await;
        assert!(matches!(
            e.ask(&QueryRequest::new("   ")).await,
            Err(EngineError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced() {
        let e = engine(MockProvider::failing(), None, settings()).await;
        let err = e.ask(&QueryRequest::new("refund?")).await.unwrap_err();
        assert!(matches!(err, EngineError::Generation(_)));
    }

    #[tokio::test]
    async fn ask_forwards_history_and_mode() {
        let llm = MockProvider::with_responses(vec!["Within 30 days [document].".into()]);
        let e = engine(llm.clone(), None, settings()).await;
        let request = QueryRequest::new("refund window?")
            .with_mode(ResponseMode::Concise)
            .with_history(vec![Message::user("hello"), Message::assistant("hi")]);
        let answer = e.ask(&request).await.unwrap();
        assert_eq!(answer.label(), "Concise Mode");
        let sent = &llm.calls()[0];
        assert!(sent.iter().any(|m| m.content == "hello"));
        assert!(sent.last().unwrap().content.starts_with("Be concise"));
    }
}
