//! Test-only mock search provider.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SearchError;
use crate::provider::{SearchProvider, WebSnippet};

#[derive(Debug, Clone, Default)]
pub struct MockSearchProvider {
    pub results: Vec<WebSnippet>,
    pub fail: bool,
    /// Milliseconds to sleep before returning results.
    pub delay_ms: u64,
    transient_failures: Arc<AtomicU32>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSearchProvider {
    #[must_use]
    pub fn with_results(results: Vec<WebSnippet>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    /// Build results from `(title, url, excerpt)` triples, ranked in order.
    #[must_use]
    pub fn with_excerpts(items: &[(&str, &str, &str)]) -> Self {
        Self::with_results(
            items
                .iter()
                .enumerate()
                .map(|(i, (title, url, excerpt))| WebSnippet {
                    title: (*title).into(),
                    url: (*url).into(),
                    excerpt: (*excerpt).into(),
                    rank: i + 1,
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Fail the next `n` searches with a transient 503.
    #[must_use]
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SearchProvider for MockSearchProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebSnippet>, SearchError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_owned());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(SearchError::Other("mock search error".into()));
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SearchError::Status {
                provider: "mock".into(),
                status: 503,
            });
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_bounded_results_and_records_queries() {
        let p = MockSearchProvider::with_excerpts(&[
            ("a", "https://a.example", "alpha"),
            ("b", "https://b.example", "beta"),
        ]);
        let out = p.search("q", 1).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(p.queries(), vec!["q".to_owned()]);
    }

    #[tokio::test]
    async fn transient_failures_then_success() {
        let p = MockSearchProvider::with_excerpts(&[("a", "https://a.example", "alpha")])
            .with_transient_failures(1);
        assert!(p.search("q", 5).await.unwrap_err().is_transient());
        assert_eq!(p.search("q", 5).await.unwrap().len(), 1);
    }
}
