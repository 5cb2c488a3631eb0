// In-memory store, used when no server is configured and by tests
pub mod memory_store;
pub use memory_store::MemoryVectorStore;

// Qdrant is optional (requires external server)
#[cfg(feature = "qdrant-backend")]
pub mod qdrant_client;
#[cfg(feature = "qdrant-backend")]
pub use qdrant_client::QdrantStore;

use crate::error::VectorStoreError;
use crate::types::{Distance, Point, PointFilter, ScoredPoint};

/// Trait for vector store operations
///
/// Collections are addressed by name so one store can hold several indexes.
/// Every call may fail transiently; callers decide whether a failure is fatal.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of all existing collections
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError>;

    /// Create a collection for vectors of `size` dimensions
    async fn create_collection(
        &self,
        name: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), VectorStoreError>;

    /// Insert or replace points by id
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), VectorStoreError>;

    /// Delete every point matching the filter
    async fn delete_where(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<(), VectorStoreError>;

    /// Nearest neighbours of `vector`, best first
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError>;

    /// Short backend identifier for logs
    fn backend_name(&self) -> &'static str;
}
