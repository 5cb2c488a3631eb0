use crate::error::CacheError;
use crate::types::{FileIndexRecord, RepoIndexState};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Change-detection store backing incremental indexing
///
/// Holds one [`FileIndexRecord`] per indexed path, one [`RepoIndexState`] per
/// repository and the timestamp of the last completed sweep. Persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HashCache {
    /// Map of file path -> record
    #[serde(default)]
    pub files: BTreeMap<String, FileIndexRecord>,
    /// Map of repo id -> aggregate state
    #[serde(default)]
    pub repos: BTreeMap<String, RepoIndexState>,
    #[serde(default)]
    pub last_indexed_timestamp: Option<DateTime<Utc>>,
}

impl HashCache {
    /// Load cache from disk; a missing file yields an empty cache
    pub fn load(cache_path: &Path) -> Result<Self, CacheError> {
        Self::read(cache_path).map_err(|e| CacheError::LoadFailed {
            path: cache_path.display().to_string(),
            reason: format!("{:#}", e),
        })
    }

    fn read(cache_path: &Path) -> Result<Self> {
        if !cache_path.exists() {
            tracing::debug!("Cache file not found, starting with empty cache");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(cache_path).context("Failed to read cache file")?;
        let cache: HashCache =
            serde_json::from_str(&content).context("Failed to parse cache file")?;

        tracing::info!(
            "Loaded cache with {} file records and {} repos",
            cache.files.len(),
            cache.repos.len()
        );
        Ok(cache)
    }

    /// Save cache to disk
    pub fn save(&self, cache_path: &Path) -> Result<(), CacheError> {
        self.write(cache_path).map_err(|e| CacheError::SaveFailed {
            path: cache_path.display().to_string(),
            reason: format!("{:#}", e),
        })
    }

    fn write(&self, cache_path: &Path) -> Result<()> {
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize cache")?;

        // Write then rename so a crash never leaves a truncated file behind
        let tmp_path = cache_path.with_extension("json.tmp");
        fs::write(&tmp_path, content).context("Failed to write cache file")?;
        fs::rename(&tmp_path, cache_path).context("Failed to replace cache file")?;

        tracing::debug!("Saved cache to {:?}", cache_path);
        Ok(())
    }

    pub fn get_file_hash(&self, file_path: &str) -> Option<&str> {
        self.files.get(file_path).map(|r| r.content_hash.as_str())
    }

    /// Record a hash without touching revision or point bookkeeping
    pub fn update_file_hash(&mut self, file_path: &str, hash: &str) {
        self.files
            .entry(file_path.to_string())
            .and_modify(|r| r.content_hash = hash.to_string())
            .or_insert_with(|| FileIndexRecord {
                file_path: file_path.to_string(),
                content_hash: hash.to_string(),
                last_indexed_revision: None,
                point_count: 0,
            });
    }

    pub fn get_record(&self, file_path: &str) -> Option<&FileIndexRecord> {
        self.files.get(file_path)
    }

    /// Insert or replace a record, returning the previous one
    pub fn update_record(&mut self, record: FileIndexRecord) -> Option<FileIndexRecord> {
        self.files.insert(record.file_path.clone(), record)
    }

    pub fn remove_record(&mut self, file_path: &str) -> Option<FileIndexRecord> {
        self.files.remove(file_path)
    }

    /// Paths of all records under `prefix`
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        self.files
            .keys()
            .filter(|p| Path::new(p).starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Sum of stored point counts for records under `prefix`
    pub fn points_under(&self, prefix: &str) -> usize {
        self.files
            .values()
            .filter(|r| Path::new(&r.file_path).starts_with(prefix))
            .map(|r| r.point_count)
            .sum()
    }

    pub fn get_last_indexed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_indexed_timestamp
    }

    pub fn update_last_indexed_timestamp(&mut self) {
        self.last_indexed_timestamp = Some(Utc::now());
    }

    pub fn repo_state(&self, repo_id: &str) -> Option<&RepoIndexState> {
        self.repos.get(repo_id)
    }

    /// Get the state for a repo, creating an empty one if needed
    pub fn repo_state_mut(&mut self, repo_id: &str) -> &mut RepoIndexState {
        self.repos
            .entry(repo_id.to_string())
            .or_insert_with(|| RepoIndexState {
                repo_id: repo_id.to_string(),
                vector_count: 0,
                last_indexed_commit: None,
            })
    }

    /// Forget the global timestamp and all repo summaries
    ///
    /// File records stay in place; the next sweep runs forced and overwrites them.
    pub fn clear_index(&mut self) {
        self.last_indexed_timestamp = None;
        self.repos.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str, hash: &str, points: usize) -> FileIndexRecord {
        FileIndexRecord {
            file_path: path.to_string(),
            content_hash: hash.to_string(),
            last_indexed_revision: Some("abc".to_string()),
            point_count: points,
        }
    }

    #[test]
    fn test_cache_save_load() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("nested").join("state.json");

        let mut cache = HashCache::default();
        cache.update_record(record("/repo/a.rs", "h1", 3));
        cache.repo_state_mut("/repo").vector_count = 3;
        cache.update_last_indexed_timestamp();
        cache.save(&cache_path).unwrap();

        let loaded = HashCache::load(&cache_path).unwrap();
        assert_eq!(cache, loaded);
        assert!(!cache_path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_nonexistent_cache() {
        let loaded = HashCache::load(Path::new("/nonexistent/path/cache.json")).unwrap();
        assert!(loaded.files.is_empty());
        assert!(loaded.get_last_indexed_timestamp().is_none());
    }

    #[test]
    fn test_load_corrupt_cache() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("state.json");
        fs::write(&cache_path, "{not json").unwrap();
        let err = HashCache::load(&cache_path).unwrap_err();
        assert!(matches!(err, CacheError::LoadFailed { .. }));
    }

    #[test]
    fn test_file_hash_operations() {
        let mut cache = HashCache::default();
        assert!(cache.get_file_hash("a.rs").is_none());

        cache.update_file_hash("a.rs", "h1");
        assert_eq!(cache.get_file_hash("a.rs"), Some("h1"));

        cache.update_record(record("a.rs", "h2", 4));
        cache.update_file_hash("a.rs", "h3");
        let rec = cache.get_record("a.rs").unwrap();
        assert_eq!(rec.content_hash, "h3");
        assert_eq!(rec.point_count, 4);

        assert!(cache.remove_record("a.rs").is_some());
        assert!(cache.get_record("a.rs").is_none());
    }

    #[test]
    fn test_clear_index_keeps_file_records() {
        let mut cache = HashCache::default();
        cache.update_record(record("/repo/a.rs", "h1", 2));
        cache.repo_state_mut("/repo").vector_count = 2;
        cache.update_last_indexed_timestamp();

        cache.clear_index();

        assert!(cache.get_last_indexed_timestamp().is_none());
        assert!(cache.repo_state("/repo").is_none());
        assert_eq!(cache.get_file_hash("/repo/a.rs"), Some("h1"));
    }

    #[test]
    fn test_paths_under() {
        let mut cache = HashCache::default();
        cache.update_file_hash("/repo/src/a.rs", "1");
        cache.update_file_hash("/repo/b.rs", "2");
        cache.update_file_hash("/repo-other/c.rs", "3");

        let paths = cache.paths_under("/repo");
        assert_eq!(paths, vec!["/repo/b.rs".to_string(), "/repo/src/a.rs".to_string()]);
    }

    #[test]
    fn test_points_under() {
        let mut cache = HashCache::default();
        cache.update_record(record("/repo/a.rs", "1", 3));
        cache.update_record(record("/repo/src/b.rs", "2", 4));
        cache.update_record(record("/other/c.rs", "3", 10));
        assert_eq!(cache.points_under("/repo"), 7);
        assert_eq!(cache.points_under("/missing"), 0);
    }

    #[test]
    fn test_old_records_without_point_count() {
        let json = r#"{"files":{"a.rs":{"file_path":"a.rs","content_hash":"h"}}}"#;
        let cache: HashCache = serde_json::from_str(json).unwrap();
        let rec = cache.get_record("a.rs").unwrap();
        assert_eq!(rec.point_count, 0);
        assert!(rec.last_indexed_revision.is_none());
        assert!(cache.repos.is_empty());
    }
}
