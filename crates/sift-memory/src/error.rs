#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("embedding failed: {0}")]
    Llm(#[from] sift_llm::LlmError),

    #[error("document error: {0}")]
    Document(#[from] crate::document::DocumentError),

    #[error(
        "embedding mismatch: index uses {indexed_model} ({indexed_dims} dims), got {model} ({dims} dims)"
    )]
    EmbeddingMismatch {
        indexed_model: String,
        indexed_dims: usize,
        model: String,
        dims: usize,
    },

    #[error("integer conversion: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("{0}")]
    Other(String),
}
