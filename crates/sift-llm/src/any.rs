#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{EmbedFuture, LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Return a cloneable closure that calls `embed()` on this provider.
    pub fn embed_fn(&self) -> impl Fn(&str) -> EmbedFuture + Send + Sync + use<> {
        let provider = std::sync::Arc::new(self.clone());
        move |text: &str| -> EmbedFuture {
            let p = std::sync::Arc::clone(&provider);
            let owned = text.to_owned();
            Box::pin(async move { p.embed(&owned).await })
        }
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::GROQ_BASE_URL;

    #[test]
    fn any_ollama_name() {
        let provider = AnyProvider::Ollama(OllamaProvider::new(
            "http://localhost:11434",
            "test".into(),
            "embed".into(),
        ));
        assert_eq!(provider.name(), "ollama");
        assert!(provider.supports_embeddings());
    }

    #[test]
    fn any_groq_has_no_embeddings_without_model() {
        let provider = AnyProvider::OpenAi(OpenAiProvider::new(
            "key".into(),
            GROQ_BASE_URL.into(),
            "llama-3.1-8b-instant".into(),
            1024,
            0.2,
            None,
        ));
        assert_eq!(provider.name(), "groq");
        assert!(!provider.supports_embeddings());
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn embed_fn_delegates_to_inner_provider() {
        let provider = AnyProvider::Mock(MockProvider::default().with_embedding(vec![1.0, 2.0]));
        let embed = provider.embed_fn();
        let v = embed("anything").await.unwrap();
        assert_eq!(v, vec![1.0, 2.0]);
    }
}
