use crate::duckduckgo::DuckDuckGoProvider;
use crate::error::SearchError;
#[cfg(feature = "mock")]
use crate::mock::MockSearchProvider;
use crate::provider::{SearchProvider, WebSnippet};
use crate::serpapi::SerpApiProvider;

macro_rules! delegate_search {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnySearchProvider::SerpApi($p) => $expr,
            AnySearchProvider::DuckDuckGo($p) => $expr,
            #[cfg(feature = "mock")]
            AnySearchProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnySearchProvider {
    SerpApi(SerpApiProvider),
    DuckDuckGo(DuckDuckGoProvider),
    #[cfg(feature = "mock")]
    Mock(MockSearchProvider),
}

impl SearchProvider for AnySearchProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebSnippet>, SearchError> {
        delegate_search!(self, |p| p.search(query, max_results).await)
    }

    fn name(&self) -> &str {
        delegate_search!(self, |p| p.name())
    }
}
