//! File discovery for a workspace sweep

use crate::glob_utils::{compile_patterns, matches_any_matcher};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct FileWalker {
    pub(crate) root: PathBuf,
    pub(crate) max_files: usize,
    pub(crate) max_file_size: u64,
    pub(crate) include_extensions: Vec<String>,
    pub(crate) include_patterns: Vec<String>,
    pub(crate) exclude_patterns: Vec<String>,
    /// Optional cancellation flag - if set to true, walk() will exit early
    cancelled: Option<Arc<AtomicBool>>,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>, max_files: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_files,
            max_file_size: u64::MAX,
            include_extensions: vec![],
            include_patterns: vec![],
            exclude_patterns: vec![],
            cancelled: None,
        }
    }

    /// Set a cancellation flag that will be checked during the walk.
    pub fn with_cancellation_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Extensions are compared case-insensitively, with or without a leading dot
    pub fn with_extensions(mut self, include_extensions: Vec<String>) -> Self {
        self.include_extensions = include_extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_patterns(
        mut self,
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
    ) -> Self {
        self.include_patterns = include_patterns;
        self.exclude_patterns = exclude_patterns;
        self
    }

    /// Walk the directory and collect candidate files, at most `max_files` of them
    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            anyhow::bail!("Root directory does not exist: {:?}", self.root);
        }
        if !self.root.is_dir() {
            anyhow::bail!("Root path is not a directory: {:?}", self.root);
        }

        let include = compile_patterns(&self.include_patterns);
        let exclude = compile_patterns(&self.exclude_patterns);
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true)
            .hidden(false)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            if self.is_cancelled() {
                tracing::info!("File walk cancelled after {} files", files.len());
                anyhow::bail!("Indexing was cancelled");
            }

            if files.len() >= self.max_files {
                tracing::warn!(
                    "Reached maximum file count ({}), remaining files are not indexed",
                    self.max_files
                );
                break;
            }

            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            if path.components().any(|c| c.as_os_str() == ".git") {
                continue;
            }

            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            if !self.accepts(&relative_path, &include, &exclude) {
                continue;
            }

            if let Ok(metadata) = entry.metadata()
                && metadata.len() > self.max_file_size
            {
                tracing::debug!("Skipping large file: {:?}", path);
                continue;
            }

            files.push(path.to_path_buf());
        }

        tracing::info!("Found {} files to index", files.len());
        Ok(files)
    }

    /// Exclusions are checked first; then extension and include filters must both pass
    pub(crate) fn accepts(
        &self,
        relative_path: &str,
        include: &[globset::GlobMatcher],
        exclude: &[globset::GlobMatcher],
    ) -> bool {
        if matches_any_matcher(relative_path, exclude) {
            return false;
        }

        if !self.include_extensions.is_empty() {
            let extension = Path::new(relative_path)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase);
            match extension {
                Some(ext) if self.include_extensions.contains(&ext) => {}
                _ => return false,
            }
        }

        include.is_empty() || matches_any_matcher(relative_path, include)
    }

    /// Whether a single path would be picked up by [`walk`](Self::walk)
    ///
    /// Ignores the file-count limit and `.gitignore` rules. Paths outside the
    /// root are never candidates.
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir) || c.as_os_str() == ".git")
        {
            return false;
        }
        let relative_path = relative.to_string_lossy().to_string();
        let include = compile_patterns(&self.include_patterns);
        let exclude = compile_patterns(&self.exclude_patterns);
        if !self.accepts(&relative_path, &include, &exclude) {
            return false;
        }
        std::fs::metadata(path).map_or(true, |m| m.len() <= self.max_file_size)
    }
}
