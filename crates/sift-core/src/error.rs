use sift_llm::LlmError;
use sift_memory::MemoryError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("index error: {0}")]
    Index(#[from] MemoryError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("no context available: no relevant documents and web search unavailable")]
    NoContextAvailable,

    #[error("query must not be empty")]
    EmptyQuery,
}
