use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};

const DEFAULT_PORT: u16 = 11434;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        }
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            tracing::debug!("ollama health check failed: {e}");
            LlmError::Unavailable
        })?;
        Ok(())
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama chat request failed: {e}")))?;

        if response.message.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "ollama".into(),
            });
        }
        Ok(response.message.content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "ollama".into(),
            })
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::User => ChatMessage::user(text),
        Role::Assistant => ChatMessage::assistant(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_with_port() {
        let (host, port) = parse_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn parse_host_port_without_port_uses_default() {
        let (host, port) = parse_host_port("http://gpu-box/");
        assert_eq!(host, "http://gpu-box");
        assert_eq!(port, DEFAULT_PORT);
    }

    #[test]
    fn convert_message_keeps_content() {
        let cm = convert_message(&Message::user("hello"));
        assert_eq!(cm.content, "hello");
    }

    #[test]
    fn ollama_always_supports_embeddings() {
        let p = OllamaProvider::new(
            "http://localhost:11434",
            "llama3.1".into(),
            "nomic-embed-text".into(),
        );
        assert!(p.supports_embeddings());
        assert_eq!(p.name(), "ollama");
    }

    #[tokio::test]
    async fn health_check_unreachable_is_unavailable() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "m".into(), "e".into());
        assert!(matches!(
            p.health_check().await,
            Err(LlmError::Unavailable)
        ));
    }
}
