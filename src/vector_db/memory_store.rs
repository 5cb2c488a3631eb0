use super::VectorStore;
use crate::error::VectorStoreError;
use crate::types::{Distance, Point, PointFilter, ScoredPoint};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

struct Collection {
    size: usize,
    distance: Distance,
    points: BTreeMap<String, Point>,
}

/// Brute-force vector store kept entirely in memory
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, 0 if it does not exist
    pub async fn point_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    /// Points stored for one file path, ordered by id
    pub async fn points_for_file(&self, collection: &str, file_path: &str) -> Vec<Point> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| {
                c.points
                    .values()
                    .filter(|p| p.payload.file_path == file_path)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn matches(filter: &PointFilter, point: &Point) -> bool {
    match filter {
        PointFilter::FilePath(path) => point.payload.file_path == *path,
    }
}

fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match distance {
        Distance::Dot => dot,
        Distance::Cosine => {
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
        Distance::Euclid => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryVectorStore {
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(
        &self,
        name: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), VectorStoreError> {
        if size == 0 {
            return Err(VectorStoreError::CollectionCreationFailed {
                collection: name.to_string(),
                reason: "vector size must be greater than 0".to_string(),
            });
        }
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                size,
                distance,
                points: BTreeMap::new(),
            });
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != target.size) {
            return Err(VectorStoreError::VectorSizeMismatch {
                collection: collection.to_string(),
                expected: target.size,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            target.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn delete_where(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        target.points.retain(|_, p| !matches(filter, p));
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        if vector.len() != target.size {
            return Err(VectorStoreError::VectorSizeMismatch {
                collection: collection.to_string(),
                expected: target.size,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<ScoredPoint> = target
            .points
            .values()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: score(target.distance, &vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        // Euclid is a distance: smaller is closer
        match target.distance {
            Distance::Euclid => hits.sort_by(|a, b| a.score.total_cmp(&b.score)),
            _ => hits.sort_by(|a, b| b.score.total_cmp(&a.score)),
        }
        hits.truncate(limit);
        Ok(hits)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
