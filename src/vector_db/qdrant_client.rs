use super::VectorStore;
use crate::error::VectorStoreError;
use crate::types::{Distance, Point, PointFilter, PointPayload, ScoredPoint};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    self as pb, Condition, CreateCollectionBuilder, DeletePointsBuilder, Filter, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;

/// Vector store backed by a Qdrant server over gRPC
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Create a new Qdrant client with default local configuration
    pub fn new() -> Result<Self, VectorStoreError> {
        Self::with_url("http://localhost:6334", None)
    }

    /// Create a new Qdrant client with a custom URL and optional API key
    pub fn with_url(url: &str, api_key: Option<String>) -> Result<Self, VectorStoreError> {
        tracing::info!("Connecting to Qdrant at {}", url);

        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client })
    }
}

fn to_qdrant_distance(distance: Distance) -> pb::Distance {
    match distance {
        Distance::Cosine => pb::Distance::Cosine,
        Distance::Dot => pb::Distance::Dot,
        Distance::Euclid => pb::Distance::Euclid,
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn to_point_struct(point: Point) -> Result<PointStruct, VectorStoreError> {
    let payload: Payload = json!({
        "file_path": point.payload.file_path,
        "content": point.payload.content,
        "line_start": point.payload.line_start,
        "line_end": point.payload.line_end,
    })
    .try_into()
    .map_err(|e| VectorStoreError::UpsertFailed(format!("invalid payload: {e}")))?;

    Ok(PointStruct::new(point.id, point.vector, payload))
}

fn payload_from_qdrant(payload: &HashMap<String, pb::Value>) -> Option<PointPayload> {
    Some(PointPayload {
        file_path: payload.get("file_path")?.as_str()?.to_string(),
        content: payload.get("content")?.as_str()?.to_string(),
        line_start: payload.get("line_start")?.as_integer()? as usize,
        line_end: payload.get("line_end")?.as_integer()? as usize,
    })
}

fn to_filter(filter: &PointFilter) -> Filter {
    match filter {
        PointFilter::FilePath(path) => {
            Filter::must([Condition::matches("file_path", path.to_string())])
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorStoreError::ListFailed(e.to_string()))?;

        Ok(collections.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(
        &self,
        name: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), VectorStoreError> {
        tracing::info!("Creating collection '{}' with dimension {}", name, size);

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: size as u64,
                        distance: to_qdrant_distance(distance).into(),
                        ..Default::default()
                    })),
                },
            ))
            .await
            .map_err(|e| VectorStoreError::CollectionCreationFailed {
                collection: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }
        tracing::debug!("Upserting {} points into '{}'", points.len(), collection);

        let points = points
            .into_iter()
            .map(to_point_struct)
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| VectorStoreError::UpsertFailed(e.to_string()))?;

        Ok(())
    }

    async fn delete_where(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<(), VectorStoreError> {
        tracing::debug!("Deleting points in '{}' matching {:?}", collection, filter);

        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| VectorStoreError::DeleteFailed(e.to_string()))?;
        if !exists {
            return Err(VectorStoreError::CollectionNotFound(collection.to_string()));
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(to_filter(filter))
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::DeleteFailed(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector, limit as u64).with_payload(true),
            )
            .await
            .map_err(|e| VectorStoreError::SearchFailed(e.to_string()))?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point_id_to_string(point.id);
                match payload_from_qdrant(&point.payload) {
                    Some(payload) => Some(ScoredPoint {
                        id,
                        score: point.score,
                        payload,
                    }),
                    None => {
                        tracing::warn!(
                            "Skipping hit {} in '{}': malformed payload",
                            id,
                            collection
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(hits)
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}
