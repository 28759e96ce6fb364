//! Relational bookkeeping for the vector index: which documents are indexed,
//! which chunks they own, their insertion order and the embedding model in use.

use sqlx::SqlitePool;

use crate::error::MemoryError;

const META_MODEL: &str = "embedding_model";
const META_DIMS: &str = "embedding_dims";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: String,
    pub source: String,
    pub chunk_count: i64,
    pub indexed_at: String,
}

/// Chunk row to register: `(chunk_id, point_id, ordinal)`.
pub type ChunkRow<'a> = (&'a str, &'a str, usize);

#[derive(Debug, Clone)]
pub struct ChunkRegistry {
    pool: SqlitePool,
}

impl ChunkRegistry {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Embedding model name and dimension recorded on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn embedding_meta(&self) -> Result<Option<(String, usize)>, MemoryError> {
        let model: Option<(String,)> = sqlx::query_as("SELECT value FROM index_meta WHERE key = ?")
            .bind(META_MODEL)
            .fetch_optional(&self.pool)
            .await?;
        let dims: Option<(String,)> = sqlx::query_as("SELECT value FROM index_meta WHERE key = ?")
            .bind(META_DIMS)
            .fetch_optional(&self.pool)
            .await?;
        match (model, dims) {
            (Some((model,)), Some((dims,))) => {
                let dims = dims
                    .parse()
                    .map_err(|e| MemoryError::Other(format!("corrupt embedding_dims: {e}")))?;
                Ok(Some((model, dims)))
            }
            _ => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn set_embedding_meta(&self, model: &str, dims: usize) -> Result<(), MemoryError> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in [(META_MODEL, model.to_owned()), (META_DIMS, dims.to_string())] {
            sqlx::query(
                "INSERT INTO index_meta (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Content fingerprint stored for a document at its last ingestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn content_hash(&self, document_id: &str) -> Result<Option<String>, MemoryError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT content_hash FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Chunk IDs of a document in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn chunk_ids(&self, document_id: &str) -> Result<Vec<String>, MemoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT chunk_id FROM chunks WHERE document_id = ? ORDER BY ordinal ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Vector-store point IDs owned by a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn point_ids(&self, document_id: &str) -> Result<Vec<String>, MemoryError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT point_id FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Replace every row of `document_id` with the given chunks in one transaction.
    ///
    /// Returns the insertion sequence number assigned to each chunk, in input order.
    /// Sequence numbers grow monotonically across the lifetime of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction is rolled back.
    pub async fn replace_document(
        &self,
        document_id: &str,
        source: &str,
        content_hash: &str,
        chunks: &[ChunkRow<'_>],
    ) -> Result<Vec<i64>, MemoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO documents (id, source, content_hash, chunk_count) VALUES (?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(source)
        .bind(content_hash)
        .bind(i64::try_from(chunks.len())?)
        .execute(&mut *tx)
        .await?;

        let mut seqs = Vec::with_capacity(chunks.len());
        for (chunk_id, point_id, ordinal) in chunks {
            let (seq,): (i64,) = sqlx::query_as(
                "INSERT INTO chunks (chunk_id, point_id, document_id, ordinal) \
                 VALUES (?, ?, ?, ?) RETURNING seq",
            )
            .bind(*chunk_id)
            .bind(*point_id)
            .bind(document_id)
            .bind(i64::try_from(*ordinal)?)
            .fetch_one(&mut *tx)
            .await?;
            seqs.push(seq);
        }

        tx.commit().await?;
        Ok(seqs)
    }

    /// Delete a document and its chunk rows. Returns the number of chunks it owned,
    /// or `None` if the document was not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove_document(&self, document_id: &str) -> Result<Option<u64>, MemoryError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT chunk_count FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some((count,)) = row else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(Some(u64::try_from(count)?))
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>, MemoryError> {
        let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
            "SELECT id, source, chunk_count, indexed_at FROM documents ORDER BY indexed_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, source, chunk_count, indexed_at)| DocumentRecord {
                id,
                source,
                chunk_count,
                indexed_at,
            })
            .collect())
    }

    /// Total number of registered chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn chunk_count(&self) -> Result<u64, MemoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count)?)
    }

    /// Forget every document, chunk and the recorded embedding model.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletes fail.
    pub async fn clear(&self) -> Result<(), MemoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
