/// Centralized error types for code-sage using thiserror
///
/// Chunk- and file-level failures are absorbed by the indexing pipeline and only
/// logged; the variants here are the ones that cross a public API boundary.
use thiserror::Error;

/// Main error type for the indexing system
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("An indexing run is already in progress")]
    AlreadyIndexing,

    #[error("No workspace folder is open")]
    NoWorkspace,

    #[error("{0}")]
    Other(String),
}

/// Errors produced by embedding providers
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The caller's cancellation token fired before or during the request
    #[error("Embedding request was cancelled")]
    Cancelled,

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {reason}")]
    Transport {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} returned an unusable response: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Whether this error means "stop the batch" rather than "skip this item"
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EmbeddingError::Cancelled)
    }
}

/// Errors related to vector store operations
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Failed to connect to vector store: {0}")]
    ConnectionFailed(String),

    #[error("Failed to list collections: {0}")]
    ListFailed(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Failed to upsert points: {0}")]
    UpsertFailed(String),

    #[error("Failed to delete points: {0}")]
    DeleteFailed(String),

    #[error("Failed to search points: {0}")]
    SearchFailed(String),

    #[error("Vector size mismatch in '{collection}': expected {expected}, got {actual}")]
    VectorSizeMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to the change-detection store
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to load cache from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save cache to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },
}

impl From<anyhow::Error> for IndexError {
    fn from(err: anyhow::Error) -> Self {
        IndexError::Other(format!("{:#}", err))
    }
}

impl IndexError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        IndexError::Other(msg.into())
    }

    /// Whether the error is a rejected concurrent run rather than a failure
    pub fn is_already_indexing(&self) -> bool {
        matches!(self, IndexError::AlreadyIndexing)
    }
}
