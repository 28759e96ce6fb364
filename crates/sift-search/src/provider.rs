use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// One organic search result. `rank` is the 1-based position reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSnippet {
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub rank: usize,
}

pub trait SearchProvider: Send + Sync {
    /// Run `query` and return at most `max_results` snippets ordered by rank.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached or its response is invalid.
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<WebSnippet>, SearchError>> + Send;

    fn name(&self) -> &str;
}

/// Sort by rank, drop entries without usable text and cap the list at `max_results`,
/// renumbering ranks from 1.
pub(crate) fn normalize(mut snippets: Vec<WebSnippet>, max_results: usize) -> Vec<WebSnippet> {
    snippets.sort_by_key(|s| s.rank);
    snippets
        .into_iter()
        .filter(|s| !s.excerpt.trim().is_empty())
        .take(max_results)
        .enumerate()
        .map(|(i, s)| WebSnippet { rank: i + 1, ..s })
        .collect()
}
