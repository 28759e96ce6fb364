//! Test-only mock LLM provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    /// Exact-text embedding overrides, checked before `embedding`.
    pub embeddings: HashMap<String, Vec<f32>>,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Number of leading `chat` calls that fail with a transient error.
    transient_failures: Arc<AtomicU32>,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.0; 384],
            embeddings: HashMap::new(),
            supports_embeddings: true,
            fail_chat: false,
            fail_embed: false,
            transient_failures: Arc::new(AtomicU32::new(0)),
            delay_ms: 0,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    #[must_use]
    pub fn with_text_embedding(mut self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), embedding);
        self
    }

    #[must_use]
    pub fn without_embeddings(mut self) -> Self {
        self.supports_embeddings = false;
        self
    }

    /// Fail the next `n` chat calls with [`LlmError::Unavailable`].
    #[must_use]
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Message lists passed to every `chat` call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LlmError::Unavailable);
        }
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.embedding.clone()))
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_then_default() {
        let p = MockProvider::with_responses(vec!["first".into()]);
        assert_eq!(p.chat(&[]).await.unwrap(), "first");
        assert_eq!(p.chat(&[]).await.unwrap(), "mock response");
        assert_eq!(p.calls().len(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_consumed() {
        let p = MockProvider::default().with_transient_failures(1);
        assert!(matches!(p.chat(&[]).await, Err(LlmError::Unavailable)));
        assert!(p.chat(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn text_embedding_overrides_default() {
        let p = MockProvider::default()
            .with_embedding(vec![0.0, 1.0])
            .with_text_embedding("rust", vec![1.0, 0.0]);
        assert_eq!(p.embed("rust").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(p.embed("other").await.unwrap(), vec![0.0, 1.0]);
    }
}
