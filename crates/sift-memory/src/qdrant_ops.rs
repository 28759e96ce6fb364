//! Qdrant backend for the vector store trait.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, value::Kind,
};

use crate::vector_store::{
    BoxFuture, FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint,
    VectorStore, VectorStoreError, rank_points,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Thin wrapper over [`Qdrant`] client encapsulating common collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Ensure a collection exists with cosine distance vectors.
    ///
    /// Idempotent: no-op if the collection already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached or collection creation fails.
    pub async fn create_if_missing(&self, collection: &str, vector_size: u64) -> QdrantResult<()> {
        if self
            .client
            .collection_exists(collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Search for similar vectors, returning scored points with payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search_points(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<Filter>,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let mut builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(f);
        }
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }

    /// Convert a JSON value to a Qdrant payload map.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if deserialization fails.
    pub fn json_to_payload(
        value: serde_json::Value,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Map a Qdrant failure to the store error, separating unreachable-server
/// failures (gRPC `Unavailable`, transport errors) from rejected requests.
fn map_qdrant(e: &qdrant_client::QdrantError, kind: fn(String) -> VectorStoreError) -> VectorStoreError {
    let msg = e.to_string();
    if is_connection_failure(&msg) {
        VectorStoreError::Connection(msg)
    } else {
        kind(msg)
    }
}

fn is_connection_failure(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    ["unavailable", "transport error", "connection refused", "error trying to connect", "deadline"]
        .iter()
        .any(|needle| lower.contains(needle))
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.create_if_missing(&collection, vector_size)
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Collection))
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(&collection)
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self.collection_exists(&collection).await?;
            if !exists {
                return Ok(());
            }
            self.client
                .delete_collection(&collection)
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Collection))?;
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
            let mut qdrant_points = Vec::with_capacity(points.len());
            for p in points {
                let payload = Self::json_to_payload(serde_json::Value::Object(
                    p.payload.into_iter().collect(),
                ))
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                qdrant_points.push(PointStruct::new(p.id, p.vector, payload));
            }
            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, qdrant_points).wait(true))
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Upsert))?;
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
            let qdrant_filter = filter.map(vector_filter_to_qdrant);
            let results = self
                .search_points(&collection, vector, limit, qdrant_filter)
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Search))?;
            let mut points: Vec<_> = results.into_iter().map(scored_point_to_vector).collect();
            rank_points(&mut points);
            Ok(points)
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
            let ids: Vec<PointId> = ids.into_iter().map(PointId::from).collect();
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&collection)
                        .points(PointsIdsList { ids })
                        .wait(true),
                )
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Delete))?;
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
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&collection)
                        .points(vector_filter_to_qdrant(filter))
                        .wait(true),
                )
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Delete))?;
            Ok(())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if !self.collection_exists(&collection).await? {
                return Ok(0);
            }
            let response = self
                .client
                .count(CountPointsBuilder::new(&collection).exact(true))
                .await
                .map_err(|e| map_qdrant(&e, VectorStoreError::Search))?;
            Ok(response.result.map_or(0, |r| r.count))
        })
    }
}

fn vector_filter_to_qdrant(filter: VectorFilter) -> Filter {
    let mut f = Filter::default();
    f.must = filter.must.into_iter().map(field_condition_to_qdrant).collect();
    f.must_not = filter
        .must_not
        .into_iter()
        .map(field_condition_to_qdrant)
        .collect();
    f
}

fn field_condition_to_qdrant(cond: FieldCondition) -> Condition {
    match cond.value {
        FieldValue::Integer(v) => Condition::matches(cond.field, v),
        FieldValue::Text(v) => Condition::matches(cond.field, v),
    }
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match point.id.and_then(|pid| pid.point_id_options) {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    };

    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_url() {
        assert!(QdrantOps::new("http://localhost:6334").is_ok());
    }

    #[test]
    fn new_invalid_url() {
        assert!(QdrantOps::new("not a valid url").is_err());
    }

    #[test]
    fn debug_format() {
        let ops = QdrantOps::new("http://localhost:6334").unwrap();
        assert!(format!("{ops:?}").contains("QdrantOps"));
    }

    #[test]
    fn json_to_payload_keeps_fields() {
        let payload =
            QdrantOps::json_to_payload(serde_json::json!({"chunk_id": "a#0", "seq": 3})).unwrap();
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn filter_conversion_keeps_both_clauses() {
        let filter = VectorFilter {
            must: vec![FieldCondition {
                field: "document_id".into(),
                value: FieldValue::Text("a.txt".into()),
            }],
            must_not: vec![FieldCondition {
                field: "ordinal".into(),
                value: FieldValue::Integer(0),
            }],
        };
        let q = vector_filter_to_qdrant(filter);
        assert_eq!(q.must.len(), 1);
        assert_eq!(q.must_not.len(), 1);
    }

    #[test]
    fn scored_point_payload_converted() {
        let payload = QdrantOps::json_to_payload(serde_json::json!({
            "content": "text",
            "seq": 4,
            "score_hint": 0.5,
            "flag": true
        }))
        .unwrap();
        let point = ScoredPoint {
            id: Some(PointId::from("0b4f8f9e-4d1c-5a8e-9b1e-2f3c4d5e6f70".to_owned())),
            payload,
            score: 0.75,
            ..ScoredPoint::default()
        };
        let v = scored_point_to_vector(point);
        assert_eq!(v.id, "0b4f8f9e-4d1c-5a8e-9b1e-2f3c4d5e6f70");
        assert_eq!(v.payload["seq"], 4);
        assert_eq!(v.payload["content"], "text");
        assert_eq!(v.payload["flag"], true);
    }

    #[test]
    fn connection_failures_are_detected() {
        assert!(is_connection_failure("status: Unavailable, message: \"tcp connect error\""));
        assert!(is_connection_failure("transport error"));
        assert!(!is_connection_failure("Not found: Collection `docs` doesn't exist!"));
    }
}
