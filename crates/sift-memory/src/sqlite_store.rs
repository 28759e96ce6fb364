//! Persistent local vector store on top of the shared `SQLite` database.
//!
//! Vectors are stored as little-endian `f32` blobs and scored with an exact
//! cosine scan, which keeps the index a single file on disk.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    cosine_similarity, matches_filter, rank_points,
};

#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_points(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Vec<f32>, HashMap<String, serde_json::Value>)>, VectorStoreError> {
        let rows: Vec<(String, Vec<u8>, String)> = sqlx::query_as(
            "SELECT point_id, vector, payload FROM vector_points WHERE collection = ?",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(&e, VectorStoreError::Search))?;

        rows.into_iter()
            .map(|(id, blob, payload)| {
                let payload = serde_json::from_str(&payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                Ok((id, decode_vector(&blob)?, payload))
            })
            .collect()
    }
}

fn map_sqlx(e: &sqlx::Error, kind: fn(String) -> VectorStoreError) -> VectorStoreError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            VectorStoreError::Connection(e.to_string())
        }
        _ => kind(e.to_string()),
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>, VectorStoreError> {
    if blob.len() % 4 != 0 {
        return Err(VectorStoreError::Serialization(format!(
            "vector blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

impl VectorStore for SqliteVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let size = i64::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            sqlx::query(
                "INSERT INTO vector_collections (name, vector_size) VALUES (?, ?) \
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(&collection)
            .bind(size)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx(&e, VectorStoreError::Collection))?;
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT vector_size FROM vector_collections WHERE name = ?")
                    .bind(&collection)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx(&e, VectorStoreError::Collection))?;
            Ok(row.is_some())
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            sqlx::query("DELETE FROM vector_collections WHERE name = ?")
                .bind(&collection)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx(&e, VectorStoreError::Collection))?;
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT vector_size FROM vector_collections WHERE name = ?")
                    .bind(&collection)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx(&e, VectorStoreError::Upsert))?;
            let Some((size,)) = row else {
                return Err(VectorStoreError::Upsert(format!(
                    "collection {collection} not found"
                )));
            };

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx(&e, VectorStoreError::Upsert))?;
            for p in points {
                if i64::try_from(p.vector.len()).ok() != Some(size) {
                    return Err(VectorStoreError::Upsert(format!(
                        "vector size {} does not match collection size {size}",
                        p.vector.len()
                    )));
                }
                let payload = serde_json::to_string(&p.payload)
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO vector_points (collection, point_id, vector, payload) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT(collection, point_id) \
                     DO UPDATE SET vector = excluded.vector, payload = excluded.payload",
                )
                .bind(&collection)
                .bind(&p.id)
                .bind(encode_vector(&p.vector))
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx(&e, VectorStoreError::Upsert))?;
            }
            tx.commit()
                .await
                .map_err(|e| map_sqlx(&e, VectorStoreError::Upsert))?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);

            let mut scored: Vec<ScoredVectorPoint> = self
                .load_points(&collection)
                .await?
                .into_iter()
                .filter(|(_, _, payload)| matches_filter(payload, f))
                .map(|(id, v, payload)| ScoredVectorPoint {
                    id,
                    score: cosine_similarity(&vector, &v),
                    payload,
                })
                .collect();

            rank_points(&mut scored);
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx(&e, VectorStoreError::Delete))?;
            for id in &ids {
                sqlx::query("DELETE FROM vector_points WHERE collection = ? AND point_id = ?")
                    .bind(&collection)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx(&e, VectorStoreError::Delete))?;
            }
            tx.commit()
                .await
                .map_err(|e| map_sqlx(&e, VectorStoreError::Delete))?;
            Ok(())
        })
    }

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let ids: Vec<String> = self
                .load_points(&collection)
                .await?
                .into_iter()
                .filter(|(_, _, payload)| matches_filter(payload, &filter))
                .map(|(id, _, _)| id)
                .collect();
            self.delete_by_ids(&collection, ids).await
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM vector_points WHERE collection = ?")
                    .bind(&collection)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| map_sqlx(&e, VectorStoreError::Search))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;

    async fn store() -> SqliteVectorStore {
        let db = SqliteStore::new(":memory:").await.unwrap();
        SqliteVectorStore::new(db.pool().clone())
    }

    fn point(id: &str, vector: Vec<f32>, doc: &str, seq: i64) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([
                ("document_id".into(), serde_json::json!(doc)),
                ("seq".into(), serde_json::json!(seq)),
            ]),
        }
    }

    #[test]
    fn vector_blob_roundtrip() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
        assert!(decode_vector(&[0, 1, 2]).is_err());
    }

    #[tokio::test]
    async fn search_ranks_and_breaks_ties_by_seq() {
        let s = store().await;
        s.ensure_collection("docs", 2).await.unwrap();
        s.upsert(
            "docs",
            vec![
                point("late", vec![1.0, 0.0], "a", 5),
                point("early", vec![1.0, 0.0], "a", 1),
                point("far", vec![0.0, 1.0], "a", 0),
            ],
        )
        .await
        .unwrap();

        let results = s.search("docs", vec![1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);
        assert_eq!(results[0].payload["document_id"], "a");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_point() {
        let s = store().await;
        s.ensure_collection("docs", 2).await.unwrap();
        s.upsert("docs", vec![point("p", vec![1.0, 0.0], "a", 1)])
            .await
            .unwrap();
        s.upsert("docs", vec![point("p", vec![0.0, 1.0], "b", 1)])
            .await
            .unwrap();
        assert_eq!(s.count("docs").await.unwrap(), 1);
        let hit = s.search("docs", vec![0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hit[0].payload["document_id"], "b");
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let s = store().await;
        let err = s
            .upsert("missing", vec![point("p", vec![1.0], "a", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn delete_by_filter_and_collection() {
        let s = store().await;
        s.ensure_collection("docs", 2).await.unwrap();
        s.upsert(
            "docs",
            vec![
                point("a1", vec![1.0, 0.0], "a", 1),
                point("b1", vec![1.0, 0.0], "b", 2),
            ],
        )
        .await
        .unwrap();
        s.delete_by_filter("docs", VectorFilter::text_eq("document_id", "a"))
            .await
            .unwrap();
        assert_eq!(s.count("docs").await.unwrap(), 1);

        s.delete_collection("docs").await.unwrap();
        assert!(!s.collection_exists("docs").await.unwrap());
        assert_eq!(s.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let path = path.to_str().unwrap();
        {
            let db = SqliteStore::new(path).await.unwrap();
            let s = SqliteVectorStore::new(db.pool().clone());
            s.ensure_collection("docs", 2).await.unwrap();
            s.upsert("docs", vec![point("a", vec![1.0, 0.0], "a", 1)])
                .await
                .unwrap();
            db.pool().close().await;
        }
        let db = SqliteStore::new(path).await.unwrap();
        let s = SqliteVectorStore::new(db.pool().clone());
        assert_eq!(s.count("docs").await.unwrap(), 1);
    }
}
