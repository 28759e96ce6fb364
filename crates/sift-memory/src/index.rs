//! The chunk index: the single shared resource behind document retrieval.
//!
//! Writes for one document ID are serialized through a per-ID async mutex;
//! writes for different IDs and all reads run concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::document::{
    Chunk, Document, DocumentError, IngestionPipeline, extract_text, read_document,
};
use crate::error::MemoryError;
use crate::registry::{ChunkRegistry, DocumentRecord};
use crate::vector_store::{SEQ_FIELD, VectorFilter, VectorPoint, VectorStore, VectorStoreError};

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub collection: String,
    /// Name of the embedding model; recorded in the registry and checked on every write.
    pub embedding_model: String,
    /// Retries for vector-store connection failures before reporting the index unavailable.
    pub max_retries: u32,
    pub retry_base: Duration,
    pub max_file_size: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            collection: "sift_documents".into(),
            embedding_model: "unknown".into(),
            max_retries: 3,
            retry_base: Duration::from_millis(200),
            max_file_size: crate::document::DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    /// Registry insertion sequence; lower means indexed earlier.
    pub seq: i64,
}

/// Result of ingesting one file from [`ChunkIndex::ingest_paths`].
#[derive(Debug)]
pub struct IngestOutcome {
    pub path: PathBuf,
    pub result: Result<Vec<String>, MemoryError>,
}

pub struct ChunkIndex {
    store: Arc<dyn VectorStore>,
    registry: ChunkRegistry,
    pipeline: IngestionPipeline,
    options: IndexOptions,
    locks: LockMap,
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Per-document write lock. The map entry is dropped with the last handle.
struct DocumentLock<'a> {
    locks: &'a LockMap,
    document_id: String,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl DocumentLock<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.mutex.lock().await
    }
}

impl Drop for DocumentLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // one reference in the map, one here
        if Arc::strong_count(&self.mutex) == 2 {
            locks.remove(&self.document_id);
        }
    }
}

impl std::fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIndex")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChunkIndex {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        registry: ChunkRegistry,
        pipeline: IngestionPipeline,
        options: IndexOptions,
    ) -> Self {
        Self {
            store,
            registry,
            pipeline,
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    fn lock_for(&self, document_id: &str) -> DocumentLock<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        DocumentLock {
            locks: &self.locks,
            document_id: document_id.to_owned(),
            mutex: Arc::clone(locks.entry(document_id.to_owned()).or_default()),
        }
    }

    async fn with_store_retry<T, F, Fut>(&self, op: &str, f: F) -> Result<T, MemoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VectorStoreError>>,
    {
        sift_llm::retry::with_backoff(
            op,
            self.options.max_retries,
            self.options.retry_base,
            VectorStoreError::is_connection,
            f,
        )
        .await
        .map_err(|e| {
            if e.is_connection() {
                tracing::error!("vector store unreachable during {op}: {e}");
                MemoryError::IndexUnavailable(e.to_string())
            } else {
                MemoryError::VectorStore(e)
            }
        })
    }

    async fn check_embedding(&self, dims: usize) -> Result<bool, MemoryError> {
        match self.registry.embedding_meta().await? {
            Some((model, indexed_dims))
                if model != self.options.embedding_model || indexed_dims != dims =>
            {
                Err(MemoryError::EmbeddingMismatch {
                    indexed_model: model,
                    indexed_dims,
                    model: self.options.embedding_model.clone(),
                    dims,
                })
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    fn fingerprint(&self, text: &str) -> String {
        let cfg = self.pipeline_config();
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        hasher.update(
            format!(
                "\0{}\0{}\0{}\0{}",
                cfg.0, cfg.1, cfg.2, self.options.embedding_model
            )
            .as_bytes(),
        );
        hasher.finalize().to_hex().to_string()
    }

    fn pipeline_config(&self) -> (usize, usize, bool) {
        let c = self.pipeline.splitter_config();
        (c.chunk_size, c.chunk_overlap, c.sentence_aware)
    }

    /// Decode, chunk, embed and store a document. Returns the IDs of its chunks.
    ///
    /// Re-ingesting an ID replaces all of its previous chunks. Ingesting unchanged
    /// content with unchanged chunking settings is a no-op that returns the existing IDs.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] or [`DocumentError::EmptyDocument`]
    /// (wrapped in [`MemoryError::Document`]) for undecodable input,
    /// [`MemoryError::EmbeddingMismatch`] when the embedding model changed, and
    /// [`MemoryError::IndexUnavailable`] when the vector store stays unreachable.
    pub async fn ingest(&self, document: Document) -> Result<Vec<String>, MemoryError> {
        let lock = self.lock_for(&document.id);
        let _guard = lock.lock().await;

        let text = extract_text(&document).await?;
        let hash = self.fingerprint(&text);

        if self.registry.content_hash(&document.id).await?.as_deref() == Some(hash.as_str()) {
            let collection = &self.options.collection;
            if self
                .with_store_retry("collection check", || self.store.collection_exists(collection))
                .await?
            {
                tracing::info!(document_id = %document.id, "document unchanged, skipping");
                return self.registry.chunk_ids(&document.id).await;
            }
        }

        let embedded = self
            .pipeline
            .prepare(&document.id, &document.source, &text)
            .await?;
        let Some(first) = embedded.first() else {
            return Err(DocumentError::EmptyDocument(document.id.clone()).into());
        };
        let dims = first.vector.len();
        if let Some(bad) = embedded.iter().find(|e| e.vector.len() != dims) {
            return Err(MemoryError::EmbeddingMismatch {
                indexed_model: self.options.embedding_model.clone(),
                indexed_dims: dims,
                model: self.options.embedding_model.clone(),
                dims: bad.vector.len(),
            });
        }
        let recorded = self.check_embedding(dims).await?;

        let collection = &self.options.collection;
        self.with_store_retry("ensure collection", || {
            self.store.ensure_collection(collection, dims as u64)
        })
        .await?;
        self.with_store_retry("delete previous chunks", || {
            self.store
                .delete_by_filter(collection, VectorFilter::text_eq("document_id", &document.id))
        })
        .await?;

        let point_ids: Vec<String> = embedded
            .iter()
            .map(|e| point_id(&e.chunk.id))
            .collect();
        let rows: Vec<_> = embedded
            .iter()
            .zip(&point_ids)
            .map(|(e, pid)| (e.chunk.id.as_str(), pid.as_str(), e.chunk.ordinal))
            .collect();
        let seqs = self
            .registry
            .replace_document(&document.id, &document.source, &hash, &rows)
            .await?;
        if !recorded {
            self.registry
                .set_embedding_meta(&self.options.embedding_model, dims)
                .await?;
        }

        let chunk_ids: Vec<String> = embedded.iter().map(|e| e.chunk.id.clone()).collect();
        let points: Vec<VectorPoint> = embedded
            .into_iter()
            .zip(point_ids)
            .zip(seqs)
            .map(|((e, id), seq)| VectorPoint {
                id,
                payload: chunk_payload(&e.chunk, seq),
                vector: e.vector,
            })
            .collect();

        let upserted = self
            .with_store_retry("upsert chunks", || {
                self.store.upsert(collection, points.clone())
            })
            .await;
        if let Err(e) = upserted {
            if let Err(cleanup) = self.registry.remove_document(&document.id).await {
                tracing::warn!(document_id = %document.id, "registry cleanup failed: {cleanup}");
            }
            return Err(e);
        }

        tracing::info!(
            document_id = %document.id,
            chunks = chunk_ids.len(),
            dims,
            "document indexed"
        );
        Ok(chunk_ids)
    }

    /// Read a file from disk and ingest it under `id` (defaults to the file name).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::FileTooLarge`] above the configured limit, plus
    /// everything [`Self::ingest`] can return.
    pub async fn ingest_path(
        &self,
        path: &Path,
        id: Option<String>,
    ) -> Result<Vec<String>, MemoryError> {
        let document = read_document(path, id, Some(self.options.max_file_size)).await?;
        self.ingest(document).await
    }

    /// Ingest several files concurrently, reporting each outcome instead of
    /// stopping at the first failure.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> Vec<IngestOutcome> {
        let futures = paths.iter().map(|path| async move {
            let result = self.ingest_path(path, None).await;
            if let Err(ref e) = result {
                tracing::warn!(path = %path.display(), "skipping file: {e}");
            }
            IngestOutcome {
                path: path.clone(),
                result,
            }
        });
        futures::future::join_all(futures).await
    }

    /// Remove a document and all of its chunks. Returns the number of chunks removed,
    /// or `None` if the document was not indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or vector store cannot be updated.
    pub async fn remove(&self, document_id: &str) -> Result<Option<u64>, MemoryError> {
        let lock = self.lock_for(document_id);
        let _guard = lock.lock().await;

        let collection = &self.options.collection;
        if self
            .with_store_retry("collection check", || self.store.collection_exists(collection))
            .await?
        {
            self.with_store_retry("delete document", || {
                self.store
                    .delete_by_filter(collection, VectorFilter::text_eq("document_id", document_id))
            })
            .await?;
        }
        let removed = self.registry.remove_document(document_id).await?;
        tracing::info!(document_id, removed = ?removed, "document removed");
        Ok(removed)
    }

    /// Drop the whole index: vector collection and registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be dropped.
    pub async fn reset(&self) -> Result<(), MemoryError> {
        let collection = &self.options.collection;
        self.with_store_retry("drop collection", || self.store.delete_collection(collection))
            .await?;
        self.registry.clear().await?;
        tracing::info!(collection = %collection, "index reset");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the registry query fails.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>, MemoryError> {
        self.registry.list_documents().await
    }

    /// # Errors
    ///
    /// Returns an error if the registry query fails.
    pub async fn chunk_count(&self) -> Result<u64, MemoryError> {
        self.registry.chunk_count().await
    }

    /// Top-`k` chunks most similar to `query`, highest score first, ties broken by
    /// insertion order. Empty when nothing has been indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded, was embedded with a
    /// different model than the index, or the vector store stays unreachable.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, MemoryError> {
        if k == 0 || self.registry.chunk_count().await? == 0 {
            return Ok(Vec::new());
        }
        let collection = &self.options.collection;
        if !self
            .with_store_retry("collection check", || self.store.collection_exists(collection))
            .await?
        {
            return Ok(Vec::new());
        }

        let vector = self.pipeline.embed(query).await?;
        self.check_embedding(vector.len()).await?;

        let points = self
            .with_store_retry("search", || {
                self.store
                    .search(collection, vector.clone(), k as u64, None)
            })
            .await?;

        let mut hits: Vec<ScoredChunk> = points
            .into_iter()
            .filter_map(|p| {
                let seq = p.payload.get(SEQ_FIELD).and_then(serde_json::Value::as_i64)?;
                let chunk = chunk_from_payload(&p.payload)?;
                Some(ScoredChunk {
                    chunk,
                    score: p.score,
                    seq,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        hits.truncate(k);
        tracing::debug!(k, hits = hits.len(), top = ?hits.first().map(|h| h.score), "index search");
        Ok(hits)
    }
}

/// Deterministic vector-store point ID for a chunk ID.
#[must_use]
pub fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn chunk_payload(chunk: &Chunk, seq: i64) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("chunk_id".to_owned(), json!(chunk.id)),
        ("document_id".to_owned(), json!(chunk.document_id)),
        ("ordinal".to_owned(), json!(chunk.ordinal)),
        ("source".to_owned(), json!(chunk.source)),
        ("content".to_owned(), json!(chunk.text)),
        (SEQ_FIELD.to_owned(), json!(seq)),
    ])
}

fn chunk_from_payload(payload: &HashMap<String, serde_json::Value>) -> Option<Chunk> {
    let get_str = |key: &str| payload.get(key).and_then(|v| v.as_str()).map(str::to_owned);
    Some(Chunk {
        id: get_str("chunk_id")?,
        document_id: get_str("document_id")?,
        ordinal: usize::try_from(payload.get("ordinal")?.as_u64()?).ok()?,
        text: get_str("content")?,
        source: get_str("source").unwrap_or_default(),
    })
}
