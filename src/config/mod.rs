/// Configuration system for code-sage
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, IndexError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace configuration
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceConfig {
    /// Folder to index; `None` means no workspace is open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Selected backend, discriminated by the `provider` key
    #[serde(flatten)]
    pub provider: ProviderConfig,

    /// Timeout in seconds for one embedding request
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// One variant per supported backend, each carrying only its own fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Local model served by Ollama
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    /// OpenAI embeddings API
    #[serde(rename = "openai")]
    OpenAi {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_openai_url")]
        base_url: String,
    },
    /// Google Gemini embeddings API
    Gemini {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default = "default_gemini_url")]
        base_url: String,
    },
}

/// Vector database backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Qdrant,
    Memory,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    #[serde(default = "default_db_backend")]
    pub backend: VectorBackend,

    /// Qdrant server URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collection name for vector storage
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Maximum number of files discovered per sweep
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum file size to index (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Extensions to index, without the dot; empty means all
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,

    #[serde(default)]
    pub include_patterns: Vec<String>,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Lines per fallback window
    #[serde(default = "default_chunk_window")]
    pub chunk_window: usize,

    /// Lines the fallback window advances by
    #[serde(default = "default_chunk_step")]
    pub chunk_step: usize,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Change-detection state file path
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

// Default value functions
fn default_embedding_timeout() -> u64 {
    30
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "text-embedding-004".to_string()
}

fn default_db_backend() -> VectorBackend {
    #[cfg(feature = "qdrant-backend")]
    return VectorBackend::Qdrant;
    #[cfg(not(feature = "qdrant-backend"))]
    return VectorBackend::Memory;
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection_name() -> String {
    "code_embeddings".to_string()
}

fn default_max_files() -> usize {
    5000
}

fn default_max_file_size() -> u64 {
    1_048_576 // 1 MB
}

fn default_include_extensions() -> Vec<String> {
    [
        "rs", "py", "js", "jsx", "mjs", "cjs", "ts", "tsx", "go", "java", "c", "h", "cc", "cpp",
        "cxx", "hpp", "hh", "md", "toml", "yaml", "yml", "json", "sh",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
    ]
}

fn default_chunk_window() -> usize {
    crate::indexer::DEFAULT_WINDOW_LINES
}

fn default_chunk_step() -> usize {
    crate::indexer::DEFAULT_STEP_LINES
}

fn default_state_path() -> PathBuf {
    crate::paths::PlatformPaths::default_state_path()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Ollama {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

impl ProviderConfig {
    /// Defaults for the provider named `name` ("ollama", "openai", "gemini")
    pub fn defaults_for(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::default()),
            "openai" => Some(Self::OpenAi {
                api_key: None,
                model: default_openai_model(),
                base_url: default_openai_url(),
            }),
            "gemini" => Some(Self::Gemini {
                api_key: None,
                model: default_gemini_model(),
                base_url: default_gemini_url(),
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::OpenAi { .. } => "openai",
            Self::Gemini { .. } => "gemini",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Ollama { model, .. } | Self::OpenAi { model, .. } | Self::Gemini { model, .. } => {
                model
            }
        }
    }

    fn model_mut(&mut self) -> &mut String {
        match self {
            Self::Ollama { model, .. } | Self::OpenAi { model, .. } | Self::Gemini { model, .. } => {
                model
            }
        }
    }

    fn base_url_mut(&mut self) -> &mut String {
        match self {
            Self::Ollama { base_url, .. }
            | Self::OpenAi { base_url, .. }
            | Self::Gemini { base_url, .. } => base_url,
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            url: default_qdrant_url(),
            api_key: None,
            collection_name: default_collection_name(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_size: default_max_file_size(),
            include_extensions: default_include_extensions(),
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
            chunk_window: default_chunk_window(),
            chunk_step: default_chunk_step(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> IndexError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, IndexError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    ///
    /// Glob patterns are not checked here; malformed ones never match.
    pub fn validate(&self) -> Result<(), IndexError> {
        #[cfg(not(feature = "qdrant-backend"))]
        if self.vector_db.backend == VectorBackend::Qdrant {
            return Err(invalid(
                "vector_db.backend",
                "qdrant support was not compiled in (enable the qdrant-backend feature)",
            ));
        }

        if self.vector_db.collection_name.trim().is_empty() {
            return Err(invalid("vector_db.collection_name", "must not be empty"));
        }

        if self.embedding.provider.model().trim().is_empty() {
            return Err(invalid("embedding.model", "must not be empty"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.indexing.max_files == 0 {
            return Err(invalid("indexing.max_files", "must be greater than 0"));
        }

        if self.indexing.max_file_size == 0 {
            return Err(invalid("indexing.max_file_size", "must be greater than 0"));
        }

        if self.indexing.chunk_window == 0 {
            return Err(invalid("indexing.chunk_window", "must be greater than 0"));
        }

        if self.indexing.chunk_step == 0 {
            return Err(invalid("indexing.chunk_step", "must be greater than 0"));
        }

        if self.indexing.chunk_step > self.indexing.chunk_window {
            return Err(invalid(
                "indexing.chunk_step",
                format!(
                    "must not exceed chunk_window ({}), got {}",
                    self.indexing.chunk_window, self.indexing.chunk_step
                ),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(root) = non_empty_var("CODE_SAGE_WORKSPACE") {
            self.workspace.root = Some(PathBuf::from(root));
        }

        // Switching provider resets its fields to that provider's defaults
        if let Some(name) = non_empty_var("CODE_SAGE_EMBEDDING_PROVIDER") {
            match ProviderConfig::defaults_for(&name) {
                Some(provider) if provider.name() != self.embedding.provider.name() => {
                    self.embedding.provider = provider;
                }
                Some(_) => {}
                None => tracing::warn!("Ignoring unknown embedding provider '{}'", name),
            }
        }

        if let Some(model) = non_empty_var("CODE_SAGE_EMBEDDING_MODEL") {
            *self.embedding.provider.model_mut() = model;
        }

        if let Some(url) = non_empty_var("CODE_SAGE_EMBEDDING_URL") {
            *self.embedding.provider.base_url_mut() = url;
        }

        match &mut self.embedding.provider {
            ProviderConfig::OpenAi { api_key, .. } if api_key.is_none() => {
                *api_key = non_empty_var("OPENAI_API_KEY");
            }
            ProviderConfig::Gemini { api_key, .. } if api_key.is_none() => {
                *api_key = non_empty_var("GEMINI_API_KEY");
            }
            _ => {}
        }

        if let Some(backend) = non_empty_var("CODE_SAGE_VECTOR_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "qdrant" => self.vector_db.backend = VectorBackend::Qdrant,
                "memory" => self.vector_db.backend = VectorBackend::Memory,
                other => tracing::warn!("Ignoring unknown vector backend '{}'", other),
            }
        }

        if let Some(url) = non_empty_var("CODE_SAGE_QDRANT_URL") {
            self.vector_db.url = url;
        }

        if let Some(key) = non_empty_var("CODE_SAGE_QDRANT_API_KEY") {
            self.vector_db.api_key = Some(key);
        }

        if let Some(name) = non_empty_var("CODE_SAGE_COLLECTION") {
            self.vector_db.collection_name = name;
        }

        if let Some(max_files) = non_empty_var("CODE_SAGE_MAX_FILES")
            && let Ok(max_files) = max_files.parse()
        {
            self.indexing.max_files = max_files;
        }

        if let Some(path) = non_empty_var("CODE_SAGE_STATE_PATH") {
            self.cache.state_path = PathBuf::from(path);
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, IndexError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
