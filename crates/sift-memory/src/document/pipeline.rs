use sift_llm::provider::EmbedFuture;

use super::{Chunk, SplitterConfig, TextSplitter, chunk_id};
use crate::error::MemoryError;

pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Split -> embed stage of ingestion. Storage is left to the caller.
pub struct IngestionPipeline {
    splitter: TextSplitter,
    embed_fn: EmbedFn,
}

impl IngestionPipeline {
    pub fn new(splitter: TextSplitter, embed_fn: EmbedFn) -> Self {
        Self { splitter, embed_fn }
    }

    #[must_use]
    pub fn splitter_config(&self) -> &SplitterConfig {
        self.splitter.config()
    }

    /// Chunk `text` and embed every chunk. Returns chunks in document order.
    ///
    /// # Errors
    ///
    /// Returns an error if any embedding call fails or returns an empty vector.
    pub async fn prepare(
        &self,
        document_id: &str,
        source: &str,
        text: &str,
    ) -> Result<Vec<EmbeddedChunk>, MemoryError> {
        let pieces = self.splitter.split(text);
        let mut out = Vec::with_capacity(pieces.len());
        for (ordinal, piece) in pieces.into_iter().enumerate() {
            let vector = (self.embed_fn)(&piece).await?;
            if vector.is_empty() {
                return Err(MemoryError::Other(format!(
                    "empty embedding for chunk {ordinal} of {document_id}"
                )));
            }
            out.push(EmbeddedChunk {
                chunk: Chunk {
                    id: chunk_id(document_id, ordinal),
                    document_id: document_id.to_owned(),
                    ordinal,
                    text: piece,
                    source: source.to_owned(),
                },
                vector,
            });
        }
        Ok(out)
    }

    /// Embed a single query string with the same model used for chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding call fails.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        Ok((self.embed_fn)(text).await?)
    }
}
