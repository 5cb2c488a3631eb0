//! Core library client for code-sage
//!
//! [`IndexClient`] owns the indexing state machine: it discovers files, runs
//! the per-file pipeline, keeps the change-detection store in sync with the
//! vector store and answers status and search queries.

mod index_lock;
mod indexing;
mod status;

pub use status::derive_status;

use crate::cache::HashCache;
use crate::config::{Config, VectorBackend};
use crate::embedding::{EmbeddingProvider, create_provider};
use crate::error::{IndexError, VectorStoreError};
use crate::git::{GitRevisionSource, RevisionSource};
use crate::indexer::{ChunkStrategy, CodeChunker};
use crate::types::*;
use crate::vector_db::{MemoryVectorStore, VectorStore};

#[cfg(feature = "qdrant-backend")]
use crate::vector_db::QdrantStore;

use index_lock::{BusyPaths, PathGuard, RunState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock, broadcast};
use tokio_util::sync::CancellationToken;

/// Capacity of the progress event channel; slow subscribers lose old events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Main client for indexing a workspace and searching it
///
/// # Example
///
/// ```no_run
/// use code_sage::{Config, IndexClient, IndexOptions};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut config = Config::default();
///     config.workspace.root = Some("/path/to/code".into());
///
///     let client = IndexClient::with_config(config)?;
///     let report = client
///         .index_workspace(IndexOptions::default(), CancellationToken::new())
///         .await?;
///     println!("{}", report.summary());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct IndexClient {
    pub(crate) embedding_provider: Arc<dyn EmbeddingProvider>,
    pub(crate) vector_store: Arc<dyn VectorStore>,
    pub(crate) chunker: Arc<CodeChunker>,
    pub(crate) revision_source: Arc<dyn RevisionSource>,
    // Persistent change-detection store
    pub(crate) hash_cache: Arc<RwLock<HashCache>>,
    pub(crate) cache_path: PathBuf,
    pub(crate) config: Arc<Config>,
    /// Canonical workspace root, `None` when no folder is open
    pub(crate) workspace: Option<PathBuf>,
    pub(crate) run_state: Arc<RunState>,
    pub(crate) busy_paths: BusyPaths,
    /// Dimension of the target collection, set once it is known to exist
    pub(crate) collection_dim: Arc<OnceCell<usize>>,
    pub(crate) events: broadcast::Sender<IndexEvent>,
}

impl IndexClient {
    /// Create a client from the default config file and environment
    pub fn new() -> Result<Self, IndexError> {
        let config = Config::new()?;
        Self::with_config(config)
    }

    /// Create a client with a custom configuration
    ///
    /// Builds the configured embedding provider and vector store. No network
    /// call is made until the first index or search.
    pub fn with_config(config: Config) -> Result<Self, IndexError> {
        config.validate()?;
        tracing::info!("Initializing index client");
        tracing::debug!("Embedding provider: {}", config.embedding.provider.name());
        tracing::debug!("Collection: {}", config.vector_db.collection_name);

        let embedding_provider = create_provider(&config.embedding)?;

        let vector_store: Arc<dyn VectorStore> = match config.vector_db.backend {
            #[cfg(feature = "qdrant-backend")]
            VectorBackend::Qdrant => {
                tracing::info!(
                    "Using Qdrant vector database backend at {}",
                    config.vector_db.url
                );
                Arc::new(QdrantStore::with_url(
                    &config.vector_db.url,
                    config.vector_db.api_key.clone(),
                )?)
            }
            #[cfg(not(feature = "qdrant-backend"))]
            VectorBackend::Qdrant => {
                return Err(VectorStoreError::ConnectionFailed(
                    "qdrant support was not compiled in".to_string(),
                )
                .into());
            }
            VectorBackend::Memory => {
                tracing::info!("Using in-memory vector store");
                Arc::new(MemoryVectorStore::new())
            }
        };

        Ok(Self::from_parts(
            config,
            embedding_provider,
            vector_store,
            Arc::new(GitRevisionSource::new()),
        ))
    }

    /// Assemble a client from already-built collaborators
    pub fn from_parts(
        config: Config,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        revision_source: Arc<dyn RevisionSource>,
    ) -> Self {
        let chunker = Arc::new(CodeChunker::new(
            ChunkStrategy::Structural,
            config.indexing.chunk_window,
            config.indexing.chunk_step,
        ));

        let cache_path = config.cache.state_path.clone();
        let hash_cache = HashCache::load(&cache_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load index state: {}, starting fresh", e);
            HashCache::default()
        });
        tracing::info!("Using index state file: {:?}", cache_path);

        let workspace = config
            .workspace
            .root
            .as_deref()
            .map(|root| std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()));

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            embedding_provider,
            vector_store,
            chunker,
            revision_source,
            hash_cache: Arc::new(RwLock::new(hash_cache)),
            cache_path,
            config: Arc::new(config),
            workspace,
            run_state: Arc::new(RunState::default()),
            busy_paths: BusyPaths::default(),
            collection_dim: Arc::new(OnceCell::new()),
            events,
        }
    }

    /// Receive progress events for subsequent runs
    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit(&self, event: IndexEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Repository id used to key [`RepoIndexState`]
    pub(crate) fn repo_id(workspace: &Path) -> String {
        path_key(workspace)
    }

    pub(crate) fn collection_name(&self) -> &str {
        &self.config.vector_db.collection_name
    }

    /// Resolve a user-supplied path against the workspace
    pub(crate) fn resolve_path(&self, path: &Path) -> PathBuf {
        let joined = match (&self.workspace, path.is_relative()) {
            (Some(root), true) => root.join(path),
            _ => path.to_path_buf(),
        };
        std::fs::canonicalize(&joined).unwrap_or(joined)
    }

    /// Current status, derived on demand and never stored
    pub async fn status(&self) -> StatusReport {
        let cache = self.hash_cache.read().await;
        let last_error = self.run_state.last_error();

        let (state, revision) = match &self.workspace {
            Some(root) => (
                cache.repo_state(&Self::repo_id(root)),
                self.revision_source.current_revision(root),
            ),
            None => (None, None),
        };

        let status = derive_status(
            self.workspace.is_some(),
            self.run_state.is_in_flight(),
            last_error.as_deref(),
            state,
            revision.as_deref(),
        );
        status::status_report(status, last_error, state)
    }

    /// Semantic search over the indexed workspace
    ///
    /// Returns an empty list when nothing has been indexed yet.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let collection = self.collection_name();
        let collections = self.vector_store.list_collections().await?;
        if !collections.iter().any(|c| c == collection) {
            tracing::debug!("Collection '{}' does not exist yet", collection);
            return Ok(Vec::new());
        }

        let vector = self
            .embedding_provider
            .generate_embedding(query, cancel)
            .await?;
        let hits = self.vector_store.search(collection, vector, limit).await?;

        tracing::debug!("Search for {:?} returned {} hits", query, hits.len());
        Ok(hits.into_iter().map(SearchHit::from).collect())
    }

    /// Forget the last-indexed timestamp and repository summary
    ///
    /// Stored points and per-file records are left in place; the next sweep
    /// runs forced and overwrites them.
    pub async fn clear_index(&self) -> Result<(), IndexError> {
        if self.run_state.is_in_flight() {
            return Err(IndexError::AlreadyIndexing);
        }
        let mut cache = self.hash_cache.write().await;
        cache.clear_index();
        cache.save(&self.cache_path)?;
        self.run_state.clear_error();
        tracing::info!("Cleared index state");
        Ok(())
    }

    /// Delete a file's points and its change-detection record
    ///
    /// Returns `false` if the path was never indexed.
    pub async fn remove_file(&self, path: &Path) -> Result<bool, IndexError> {
        let resolved = self.resolve_path(path);
        let key = path_key(&resolved);
        let _guard = PathGuard::try_acquire(&self.busy_paths, &key)
            .ok_or_else(|| IndexError::other(format!("{} is being indexed", key)))?;

        let removed = self.remove_indexed_path(&key).await?;
        if removed {
            self.hash_cache.read().await.save(&self.cache_path)?;
        }
        Ok(removed)
    }

    /// Drop points and record for `key`, without saving the cache
    pub(crate) async fn remove_indexed_path(&self, key: &str) -> Result<bool, IndexError> {
        let record = self.hash_cache.read().await.get_record(key).cloned();
        let Some(record) = record else {
            return Ok(false);
        };

        if record.point_count > 0 {
            self.delete_points_for(key).await?;
        }

        let mut cache = self.hash_cache.write().await;
        cache.remove_record(key);
        if let Some(root) = &self.workspace {
            refresh_vector_count(&mut cache, root, false);
        }
        tracing::info!("Removed {} ({} points)", key, record.point_count);
        Ok(true)
    }

    /// Delete every point stored for `key`; a missing collection holds none
    pub(crate) async fn delete_points_for(&self, key: &str) -> Result<(), VectorStoreError> {
        match self
            .vector_store
            .delete_where(self.collection_name(), &PointFilter::FilePath(key.to_string()))
            .await
        {
            Err(VectorStoreError::CollectionNotFound(name)) => {
                tracing::debug!("Collection '{}' does not exist, nothing to delete", name);
                Ok(())
            }
            other => other,
        }
    }

    /// Create the target collection if it does not exist yet
    ///
    /// Sized from the provider's dimension with cosine distance. Cached after
    /// the first success; a failure is retried on the next call.
    pub(crate) async fn ensure_collection(
        &self,
        cancel: &CancellationToken,
    ) -> Result<usize, IndexError> {
        self.collection_dim
            .get_or_try_init(|| async {
                let dimension = self.embedding_provider.embedding_dimension(cancel).await?;
                let name = self.collection_name();
                let existing = self.vector_store.list_collections().await?;

                if existing.iter().any(|c| c == name) {
                    tracing::info!("Collection '{}' already exists", name);
                } else {
                    self.vector_store
                        .create_collection(name, dimension, Distance::Cosine)
                        .await?;
                    tracing::info!(
                        "Created collection '{}' ({} dimensions, {})",
                        name,
                        dimension,
                        self.vector_store.backend_name()
                    );
                }
                Ok::<usize, IndexError>(dimension)
            })
            .await
            .copied()
    }
}

/// Key used for records, payloads and path guards
pub(crate) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Recompute a repo's vector count from its file records
///
/// With `create` unset, a cleared repo summary stays absent.
pub(crate) fn refresh_vector_count(cache: &mut HashCache, workspace: &Path, create: bool) {
    let repo_id = IndexClient::repo_id(workspace);
    if !create && cache.repo_state(&repo_id).is_none() {
        return;
    }
    let total = cache.points_under(&repo_id);
    cache.repo_state_mut(&repo_id).vector_count = total;
}

#[cfg(test)]
pub(crate) mod test_support;
