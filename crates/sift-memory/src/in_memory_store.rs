use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
    cosine_similarity, matches_filter, rank_points,
};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    vector_size: u64,
    points: HashMap<String, StoredPoint>,
}

/// Process-local vector store. Contents vanish with the process.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection).or_insert_with(|| InMemoryCollection {
                vector_size,
                points: HashMap::new(),
            });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.remove(&collection);
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
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            for p in points {
                if p.vector.len() as u64 != col.vector_size {
                    return Err(VectorStoreError::Upsert(format!(
                        "vector size {} does not match collection size {}",
                        p.vector.len(),
                        col.vector_size
                    )));
                }
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
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
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let Some(col) = cols.get(&collection) else {
                return Ok(Vec::new());
            };

            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .filter(|(_, sp)| matches_filter(&sp.payload, f))
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
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
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            if let Some(col) = cols.get_mut(&collection) {
                for id in &ids {
                    col.points.remove(id);
                }
            }
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
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            if let Some(col) = cols.get_mut(&collection) {
                col.points.retain(|_, sp| !matches_filter(&sp.payload, &filter));
            }
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(cols
                .get(&collection)
                .map_or(0, |col| col.points.len() as u64))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, doc: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("document_id".into(), serde_json::json!(doc))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_idempotent() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("test").await.unwrap());
        store.ensure_collection("test", 3).await.unwrap();
        store.ensure_collection("test", 3).await.unwrap();
        assert!(store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_and_search_orders_by_score() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store
            .upsert(
                "test",
                vec![
                    point("a", vec![1.0, 0.0, 0.0], "x"),
                    point("b", vec![0.0, 1.0, 0.0], "x"),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search("test", vec![1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn upsert_same_id_replaces() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 2).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![1.0, 0.0], "x")])
            .await
            .unwrap();
        store
            .upsert("test", vec![point("a", vec![0.0, 1.0], "x")])
            .await
            .unwrap();
        assert_eq!(store.count("test").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        let result = store.upsert("test", vec![point("a", vec![1.0], "x")]).await;
        assert!(matches!(result, Err(VectorStoreError::Upsert(_))));
    }

    #[tokio::test]
    async fn search_missing_collection_is_empty() {
        let store = InMemoryVectorStore::new();
        let results = store.search("nope", vec![1.0], 4, None).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(store.count("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_filter_removes_one_document() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 2).await.unwrap();
        store
            .upsert(
                "test",
                vec![
                    point("a", vec![1.0, 0.0], "keep"),
                    point("b", vec![1.0, 0.0], "drop"),
                    point("c", vec![0.0, 1.0], "drop"),
                ],
            )
            .await
            .unwrap();
        store
            .delete_by_filter("test", VectorFilter::text_eq("document_id", "drop"))
            .await
            .unwrap();
        assert_eq!(store.count("test").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_by_ids_removes_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![1.0, 0.0, 0.0], "x")])
            .await
            .unwrap();
        store.delete_by_ids("test", vec!["a".into()]).await.unwrap();
        assert_eq!(store.count("test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_collection_removes() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store.delete_collection("test").await.unwrap();
        assert!(!store.collection_exists("test").await.unwrap());
    }

    #[test]
    fn debug_format() {
        let dbg = format!("{:?}", InMemoryVectorStore::default());
        assert!(dbg.contains("InMemoryVectorStore"));
    }
}
