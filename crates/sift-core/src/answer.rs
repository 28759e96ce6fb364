use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sift_llm::retry::with_backoff;
use sift_llm::{LlmError, LlmProvider, Message};

use crate::context::{ContextBlock, Provenance};
use crate::router::RouteDecision;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions accurately using the context you are given.";

const CITATION_INSTRUCTIONS: &str = "Cite the sources you rely on with their tags: [document] for \
     indexed documents and [web] for web search results. If the context does not contain the \
     answer, say so instead of guessing.";

const GENERAL_KNOWLEDGE_NOTE: &str = "No document or web context is available for this question. \
     Answer from general knowledge and state that no sources were consulted.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Detailed,
    Concise,
}

impl ResponseMode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Detailed => "Detailed Mode",
            Self::Concise => "Concise Mode",
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Self::Detailed => {
                "Be detailed: reason step by step, ground each point in the context, and include \
                 examples and relevant background."
            }
            Self::Concise => {
                "Be concise: 2-3 sentences max, direct answers only, no examples or background."
            }
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detailed => "detailed",
            Self::Concise => "concise",
        })
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detailed" => Ok(Self::Detailed),
            "concise" => Ok(Self::Concise),
            other => Err(format!("unknown response mode: {other} (expected detailed or concise)")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub mode: ResponseMode,
    pub decision: RouteDecision,
    pub provenance: Vec<Provenance>,
}

impl Answer {
    /// Display label, e.g. `"Concise Mode + Web Search"`.
    #[must_use]
    pub fn label(&self) -> String {
        let mut label = self.mode.label().to_owned();
        if self.provenance.contains(&Provenance::Web) {
            label.push_str(" + Web Search");
        }
        label
    }
}

#[derive(Debug, Clone)]
pub struct AnswerGenerator<P> {
    provider: P,
    system_prompt: String,
    timeout: Duration,
    retry_base: Duration,
}

impl<P: LlmProvider> AnswerGenerator<P> {
    #[must_use]
    pub fn new(provider: P, system_prompt: String, timeout: Duration) -> Self {
        Self {
            provider,
            system_prompt,
            timeout,
            retry_base: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// System prompt, context, history, the query and finally the mode directive.
    #[must_use]
    pub fn build_messages(
        &self,
        query: &str,
        context: &ContextBlock,
        decision: RouteDecision,
        mode: ResponseMode,
        history: &[Message],
    ) -> Vec<Message> {
        let system = if self.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            self.system_prompt.as_str()
        };
        let mut messages = Vec::with_capacity(history.len() + 4);
        messages.push(Message::system(system));
        if !context.is_empty() {
            messages.push(Message::system(format!(
                "Relevant context:\n\n{}\n\n{CITATION_INSTRUCTIONS}",
                context.render()
            )));
        } else if decision == RouteDecision::GeneralKnowledge {
            messages.push(Message::system(GENERAL_KNOWLEDGE_NOTE));
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(query));
        messages.push(Message::system(mode.directive()));
        messages
    }

    /// Ask the model, retrying once on transient failures and timeouts.
    ///
    /// # Errors
    ///
    /// Returns the provider error (or [`LlmError::Timeout`]) after the retry fails.
    pub async fn generate(
        &self,
        query: &str,
        context: &ContextBlock,
        decision: RouteDecision,
        mode: ResponseMode,
        history: &[Message],
    ) -> Result<Answer, LlmError> {
        let messages = self.build_messages(query, context, decision, mode, history);
        let messages = messages.as_slice();
        let provider = &self.provider;
        let timeout = self.timeout;

        let text = with_backoff(
            "answer generation",
            1,
            self.retry_base,
            LlmError::is_transient,
            move || async move {
                tokio::time::timeout(timeout, provider.chat(messages))
                    .await
                    .unwrap_or_else(|_| {
                        Err(LlmError::Timeout {
                            provider: provider.name().to_owned(),
                            seconds: timeout.as_secs(),
                        })
                    })
            },
        )
        .await?;

        Ok(Answer {
            text,
            mode,
            decision,
            provenance: context.provenance(),
        })
    }
}
