/// Platform-specific locations for the config file and the index state
///
/// Resolved through `dirs`, which follows the XDG Base Directory
/// specification on Linux and the native conventions on macOS and Windows.
use std::path::PathBuf;

const APP_DIR: &str = "code-sage";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// User cache directory, or "." when the platform reports none
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// User config directory, or "." when the platform reports none
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {cache_dir}/code-sage
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/code-sage
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Get default change-detection state path
    ///
    /// Returns: {cache_dir}/code-sage/index_state.json
    pub fn default_state_path() -> PathBuf {
        Self::project_cache_dir().join("index_state.json")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/code-sage/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}
