//! Index fixtures shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use sift_llm::provider::EmbedFuture;
use sift_memory::document::{EmbedFn, IngestionPipeline, SplitterConfig, TextSplitter};
use sift_memory::{ChunkIndex, ChunkRegistry, IndexOptions, InMemoryVectorStore, SqliteStore};

pub const KEYWORDS: [&str; 4] = ["refund", "shipping", "warranty", "weather"];

/// Embeds text as keyword presence plus a constant bias component.
pub fn keyword_embed() -> EmbedFn {
    Box::new(|text: &str| -> EmbedFuture {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        Box::pin(async move { Ok(v) })
    })
}

pub async fn keyword_index() -> Arc<ChunkIndex> {
    let db = SqliteStore::new(":memory:").await.unwrap();
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: 60,
        chunk_overlap: 0,
        sentence_aware: true,
    });
    Arc::new(ChunkIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        ChunkRegistry::new(db.pool().clone()),
        IngestionPipeline::new(splitter, keyword_embed()),
        IndexOptions {
            embedding_model: "keywords".into(),
            retry_base: Duration::from_millis(1),
            ..IndexOptions::default()
        },
    ))
}
