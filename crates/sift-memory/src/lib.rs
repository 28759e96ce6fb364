//! Document chunking, embedding and vector indexing backed by SQLite or Qdrant.

pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod index;
pub mod qdrant_ops;
pub mod registry;
pub mod sqlite;
pub mod sqlite_store;
pub mod vector_store;

pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use index::{ChunkIndex, IndexOptions, IngestOutcome, ScoredChunk};
pub use qdrant_ops::QdrantOps;
pub use registry::{ChunkRegistry, DocumentRecord};
pub use sqlite::SqliteStore;
pub use sqlite_store::SqliteVectorStore;
pub use vector_store::{
    FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};
