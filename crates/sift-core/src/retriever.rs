use std::sync::Arc;

use sift_memory::{ChunkIndex, MemoryError, ScoredChunk};

/// Read side of the chunk index.
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<ChunkIndex>,
}

impl Retriever {
    #[must_use]
    pub fn new(index: Arc<ChunkIndex>) -> Self {
        Self { index }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<ChunkIndex> {
        &self.index
    }

    /// Top-`k` chunks for `query`, highest similarity first; ties keep indexing order.
    /// Empty when nothing has been indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the vector store is unreachable.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, MemoryError> {
        let hits = self.index.search(query, k).await?;
        tracing::debug!(
            k,
            hits = hits.len(),
            top = ?top_score(&hits),
            "retrieval complete"
        );
        Ok(hits)
    }
}

/// Highest similarity in a retrieval result, `None` when it is empty.
#[must_use]
pub fn top_score(hits: &[ScoredChunk]) -> Option<f32> {
    hits.first().map(|h| h.score)
}
