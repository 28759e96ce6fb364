use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl VectorStoreError {
    /// Whether the backend could not be reached at all, as opposed to rejecting the request.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

impl VectorFilter {
    /// Filter matching points whose `field` equals the given text.
    #[must_use]
    pub fn text_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            must: vec![FieldCondition {
                field: field.into(),
                value: FieldValue::Text(value.into()),
            }],
            must_not: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Payload key holding the registry insertion sequence, used to break score ties.
pub const SEQ_FIELD: &str = "seq";

pub trait VectorStore: Send + Sync {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Top-`limit` points by cosine similarity, highest first.
    ///
    /// Equal scores are ordered by ascending [`SEQ_FIELD`] payload value where the
    /// backend controls ordering.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Number of points in the collection; zero when the collection does not exist.
    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>>;
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub(crate) fn matches_filter(
    payload: &HashMap<String, serde_json::Value>,
    filter: &VectorFilter,
) -> bool {
    for cond in &filter.must {
        let Some(val) = payload.get(&cond.field) else {
            return false;
        };
        if !field_matches(val, &cond.value) {
            return false;
        }
    }
    for cond in &filter.must_not {
        if let Some(val) = payload.get(&cond.field)
            && field_matches(val, &cond.value)
        {
            return false;
        }
    }
    true
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Integer(i) => val.as_i64() == Some(*i),
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
    }
}

/// Sort by descending score, then ascending insertion sequence, then id.
pub(crate) fn rank_points(points: &mut [ScoredVectorPoint]) {
    points.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| seq_of(a).cmp(&seq_of(b)))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn seq_of(point: &ScoredVectorPoint) -> i64 {
    point
        .payload
        .get(SEQ_FIELD)
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(i64::MAX)
}
