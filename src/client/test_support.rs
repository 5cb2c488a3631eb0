//! Scripted collaborators shared by the client tests

use super::IndexClient;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, VectorStoreError};
use crate::git::RevisionSource;
use crate::types::{Distance, Point, PointFilter, ScoredPoint};
use crate::vector_db::{MemoryVectorStore, VectorStore};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

pub(crate) const DIM: usize = 4;

/// Blocks embedding calls until released, signalling when the first one arrives
pub(crate) struct Gate {
    pub(crate) entered: Notify,
    pub(crate) release: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

/// Embedding provider with deterministic vectors and scripted failures
#[derive(Default)]
pub(crate) struct MockProvider {
    pub(crate) calls: AtomicUsize,
    /// Texts containing this marker fail with an HTTP error
    pub(crate) fail_marker: Option<String>,
    /// Every call fails
    pub(crate) unavailable: AtomicBool,
    /// Texts containing the marker cancel the token and report cancellation
    pub(crate) cancel_on: Option<(String, CancellationToken)>,
    /// Texts containing this marker get a vector of the wrong length
    pub(crate) short_marker: Option<String>,
    pub(crate) gate: Option<Arc<Gate>>,
}

impl MockProvider {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn vector_for(text: &str) -> Vec<f32> {
    let count = |c: char| text.chars().filter(|x| *x == c).count() as f32;
    vec![text.len() as f32, count('a') + 1.0, count('e') + 1.0, count('o') + 1.0]
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    async fn generate_embedding(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if cancel.is_cancelled() {
            return Err(EmbeddingError::Cancelled);
        }
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            let _permit = gate.release.acquire().await.map_err(|_| EmbeddingError::Cancelled)?;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((marker, token)) = &self.cancel_on
            && text.contains(marker.as_str())
        {
            token.cancel();
            return Err(EmbeddingError::Cancelled);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Transport {
                provider: "mock",
                reason: "connection refused".to_string(),
            });
        }
        if let Some(marker) = &self.fail_marker
            && text.contains(marker.as_str())
        {
            return Err(EmbeddingError::Http {
                provider: "mock",
                status: 500,
                body: "boom".to_string(),
            });
        }
        if let Some(marker) = &self.short_marker
            && text.contains(marker.as_str())
        {
            return Ok(vec![1.0; DIM - 1]);
        }
        Ok(vector_for(text))
    }

    async fn embedding_dimension(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<usize, EmbeddingError> {
        Ok(DIM)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

/// Memory store that records the order of writes and can fail on demand
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub(crate) inner: MemoryVectorStore,
    pub(crate) ops: Mutex<Vec<String>>,
    pub(crate) fail_create: AtomicBool,
    pub(crate) fail_upsert: AtomicBool,
}

impl RecordingStore {
    pub(crate) fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait::async_trait]
impl VectorStore for RecordingStore {
    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        self.inner.list_collections().await
    }

    async fn create_collection(
        &self,
        name: &str,
        size: usize,
        distance: Distance,
    ) -> Result<(), VectorStoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(VectorStoreError::CollectionCreationFailed {
                collection: name.to_string(),
                reason: "server unreachable".to_string(),
            });
        }
        self.record(format!("create:{}:{}", name, size));
        self.inner.create_collection(name, size, distance).await
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<(), VectorStoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(VectorStoreError::UpsertFailed("server unreachable".to_string()));
        }
        let file = points
            .first()
            .map(|p| p.payload.file_path.clone())
            .unwrap_or_default();
        self.record(format!("upsert:{}:{}", file, points.len()));
        self.inner.upsert(collection, points).await
    }

    async fn delete_where(
        &self,
        collection: &str,
        filter: &PointFilter,
    ) -> Result<(), VectorStoreError> {
        let PointFilter::FilePath(path) = filter;
        self.record(format!("delete:{}", path));
        self.inner.delete_where(collection, filter).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        self.inner.search(collection, vector, limit).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Revision source whose answer can be changed mid-test
#[derive(Default)]
pub(crate) struct MutableRevision(pub(crate) Mutex<Option<String>>);

impl MutableRevision {
    pub(crate) fn new(revision: &str) -> Self {
        Self(Mutex::new(Some(revision.to_string())))
    }

    pub(crate) fn set(&self, revision: &str) {
        *self.0.lock().unwrap() = Some(revision.to_string());
    }
}

impl RevisionSource for MutableRevision {
    fn current_revision(&self, _workspace: &Path) -> Option<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A workspace directory, a separate state directory and the client over them
pub(crate) struct Harness {
    pub(crate) workspace: TempDir,
    pub(crate) state_dir: TempDir,
    pub(crate) provider: Arc<MockProvider>,
    pub(crate) store: Arc<RecordingStore>,
    pub(crate) revision: Arc<MutableRevision>,
    pub(crate) client: IndexClient,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_provider(MockProvider::default())
    }

    pub(crate) fn with_provider(provider: MockProvider) -> Self {
        let workspace = TempDir::new().unwrap();
        let state_dir = TempDir::new().unwrap();
        let provider = Arc::new(provider);
        let store = Arc::new(RecordingStore::default());
        let revision = Arc::new(MutableRevision::new("rev1"));
        let client = build_client(
            workspace.path(),
            state_dir.path(),
            provider.clone(),
            store.clone(),
            revision.clone(),
        );
        Self {
            workspace,
            state_dir,
            provider,
            store,
            revision,
            client,
        }
    }

    /// A second client over the same directories and store, as after a restart
    pub(crate) fn reopen(&self) -> IndexClient {
        build_client(
            self.workspace.path(),
            self.state_dir.path(),
            self.provider.clone(),
            self.store.clone(),
            self.revision.clone(),
        )
    }

    pub(crate) fn write(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.workspace.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Record key the client uses for a workspace-relative file
    pub(crate) fn key(&self, name: &str) -> String {
        let root = self.client.workspace().unwrap();
        root.join(name).to_string_lossy().into_owned()
    }

    pub(crate) async fn points_for(&self, name: &str) -> Vec<Point> {
        self.store
            .inner
            .points_for_file(&self.client.config.vector_db.collection_name, &self.key(name))
            .await
    }

    pub(crate) async fn total_points(&self) -> usize {
        self.store
            .inner
            .point_count(&self.client.config.vector_db.collection_name)
            .await
    }
}

pub(crate) fn build_client(
    workspace: &Path,
    state_dir: &Path,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    revision: Arc<dyn RevisionSource>,
) -> IndexClient {
    let mut config = Config::default();
    config.workspace.root = Some(workspace.to_path_buf());
    config.cache.state_path = state_dir.join("index_state.json");
    config.vector_db.collection_name = "test_code".to_string();
    IndexClient::from_parts(config, provider, store, revision)
}
