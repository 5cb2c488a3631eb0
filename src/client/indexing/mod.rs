use super::index_lock::PathGuard;
use super::{IndexClient, path_key, refresh_vector_count};
use crate::error::{EmbeddingError, IndexError};
use crate::indexer::{FileWalker, content_hash};
use crate::types::{
    FileIndexRecord, FileOutcome, IndexEvent, IndexOptions, IndexReport, Point, RunOutcome,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Helper macro to stop the per-file pipeline once cancellation is requested
macro_rules! check_cancelled {
    ($cancel_token:expr) => {
        if $cancel_token.is_cancelled() {
            return Ok(FileOutcome::Cancelled);
        }
    };
}

/// Why the per-file pipeline gave up on a file
#[derive(Debug)]
pub(crate) enum FileError {
    /// The file is skipped and counted as failed; the run continues
    Skipped(String),
    /// Store or provider failure that ends the whole run
    Fatal(IndexError),
}

impl From<IndexError> for FileError {
    fn from(err: IndexError) -> Self {
        FileError::Fatal(err)
    }
}

impl IndexClient {
    fn file_walker(&self, root: &Path) -> FileWalker {
        let indexing = &self.config.indexing;
        FileWalker::new(root, indexing.max_files)
            .with_max_file_size(indexing.max_file_size)
            .with_extensions(indexing.include_extensions.clone())
            .with_patterns(
                indexing.include_patterns.clone(),
                indexing.exclude_patterns.clone(),
            )
    }

    /// Index every discovered file in the workspace
    ///
    /// Unchanged files are skipped unless the sweep is forced, either through
    /// `options.force` or because no sweep has completed since the last clear.
    /// Only one sweep may run at a time; a concurrent request fails with
    /// [`IndexError::AlreadyIndexing`]. A cancelled sweep returns `Ok` with a
    /// cancelled report and keeps everything committed so far.
    pub async fn index_workspace(
        &self,
        options: IndexOptions,
        cancel: CancellationToken,
    ) -> Result<IndexReport, IndexError> {
        let workspace = self.workspace.clone().ok_or(IndexError::NoWorkspace)?;

        let _run = self.run_state.try_begin().ok_or_else(|| {
            tracing::info!("Indexing already in progress, rejecting new request");
            IndexError::AlreadyIndexing
        })?;

        match self.run_sweep(&workspace, options, &cancel).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Indexing failed: {}", e);
                self.run_state.fail(e.to_string());
                self.emit(IndexEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_sweep(
        &self,
        workspace: &Path,
        options: IndexOptions,
        cancel: &CancellationToken,
    ) -> Result<IndexReport, IndexError> {
        let start = Instant::now();
        let revision = self.revision_source.current_revision(workspace);
        let force = options.force
            || self
                .hash_cache
                .read()
                .await
                .get_last_indexed_timestamp()
                .is_none();

        tracing::info!(
            "Indexing {} (revision {}, force: {})",
            workspace.display(),
            revision.as_deref().unwrap_or("none"),
            force
        );

        let files = match self.discover(workspace, cancel).await {
            Ok(files) => files,
            Err(_) if cancel.is_cancelled() => {
                let mut report = IndexReport::new(0);
                return Ok(self.finish_cancelled(&mut report, start).await);
            }
            Err(e) => return Err(e),
        };

        let total = files.len();
        let mut report = IndexReport::new(total);
        self.emit(IndexEvent::Started { total });

        report.files_removed = self.purge_missing(workspace, &files).await?;

        for path in &files {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Indexing cancelled after {} of {} files",
                    report.files_processed(),
                    total
                );
                return Ok(self.finish_cancelled(&mut report, start).await);
            }

            let key = path_key(path);
            let indexed = match self
                .process_file(path, &key, force, revision.as_deref(), cancel)
                .await
            {
                Ok(FileOutcome::Indexed { chunks, points }) => {
                    report.files_indexed += 1;
                    report.chunks_created += chunks;
                    report.points_upserted += points;
                    true
                }
                Ok(FileOutcome::Unchanged) => {
                    report.files_unchanged += 1;
                    false
                }
                Ok(FileOutcome::InFlight | FileOutcome::Excluded) => {
                    tracing::debug!("Skipping {} (busy or excluded)", key);
                    report.files_unchanged += 1;
                    false
                }
                Ok(FileOutcome::NoPoints { chunks }) => {
                    report.files_failed += 1;
                    report.chunks_created += chunks;
                    report
                        .errors
                        .push(format!("{}: no chunk produced an embedding", key));
                    false
                }
                Ok(FileOutcome::Cancelled) => {
                    return Ok(self.finish_cancelled(&mut report, start).await);
                }
                Err(FileError::Skipped(reason)) => {
                    tracing::warn!("Skipping {}: {}", key, reason);
                    report.files_failed += 1;
                    report.errors.push(format!("{}: {}", key, reason));
                    false
                }
                Err(FileError::Fatal(e)) => return Err(e),
            };

            self.emit(IndexEvent::FileProcessed {
                path: key,
                indexed,
                processed: report.files_processed(),
                total,
            });
        }

        // Nothing at all could be indexed: surface the root cause
        if report.files_failed > 0 && report.files_indexed == 0 && report.files_unchanged == 0 {
            let cause = report
                .root_cause()
                .unwrap_or("every file failed")
                .to_string();
            self.save_cache().await;
            return Err(IndexError::other(format!(
                "Indexing failed, no file could be indexed: {}",
                cause
            )));
        }

        {
            let mut cache = self.hash_cache.write().await;
            refresh_vector_count(&mut cache, workspace, true);
            cache
                .repo_state_mut(&Self::repo_id(workspace))
                .last_indexed_commit = revision;
            cache.update_last_indexed_timestamp();
            cache.save(&self.cache_path)?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexing complete: {} in {}ms",
            report.summary(),
            report.duration_ms
        );
        self.emit(IndexEvent::Completed {
            report: report.clone(),
        });
        Ok(report)
    }

    /// Walk the workspace on a blocking thread, honouring cancellation
    async fn discover(
        &self,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, IndexError> {
        let flag = Arc::new(AtomicBool::new(cancel.is_cancelled()));
        let watcher = tokio::spawn({
            let flag = Arc::clone(&flag);
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
                flag.store(true, Ordering::Release);
            }
        });

        let walker = self.file_walker(workspace).with_cancellation_flag(flag);
        let result = tokio::task::spawn_blocking(move || walker.walk()).await;
        watcher.abort();

        let files = result
            .map_err(|e| IndexError::other(format!("File walk task failed: {}", e)))??;
        Ok(files)
    }

    /// Remove records and points for files that no longer exist on disk
    async fn purge_missing(
        &self,
        workspace: &Path,
        discovered: &[PathBuf],
    ) -> Result<usize, IndexError> {
        let discovered: HashSet<String> = discovered.iter().map(|p| path_key(p)).collect();
        let stale: Vec<String> = self
            .hash_cache
            .read()
            .await
            .paths_under(&Self::repo_id(workspace))
            .into_iter()
            .filter(|p| !discovered.contains(p) && !Path::new(p).exists())
            .collect();

        let mut removed = 0;
        for key in stale {
            let Some(_guard) = PathGuard::try_acquire(&self.busy_paths, &key) else {
                continue;
            };
            if self.remove_indexed_path(&key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!("Purged {} deleted files from the index", removed);
        }
        Ok(removed)
    }

    async fn finish_cancelled(&self, report: &mut IndexReport, start: Instant) -> IndexReport {
        report.outcome = RunOutcome::Cancelled;
        report.duration_ms = start.elapsed().as_millis() as u64;
        self.save_cache().await;
        tracing::info!("Indexing cancelled: {}", report.summary());
        self.emit(IndexEvent::Cancelled {
            report: report.clone(),
        });
        report.clone()
    }

    async fn save_cache(&self) {
        if let Err(e) = self.hash_cache.read().await.save(&self.cache_path) {
            tracing::warn!("Failed to save index state: {}", e);
        }
    }

    /// Run the per-file pipeline for one path, outside the sweep lock
    ///
    /// Used for file-watch driven updates. The path must pass the discovery
    /// filters. Only a changed hash triggers work; a path already being
    /// processed returns [`FileOutcome::InFlight`].
    pub async fn index_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, IndexError> {
        let workspace = self.workspace.as_deref().ok_or(IndexError::NoWorkspace)?;
        let resolved = self.resolve_path(path);
        if !self.file_walker(workspace).is_candidate(&resolved) {
            tracing::debug!("Ignoring {}: excluded by discovery rules", resolved.display());
            return Ok(FileOutcome::Excluded);
        }

        let key = path_key(&resolved);
        let revision = self.revision_source.current_revision(workspace);
        match self
            .process_file(&resolved, &key, false, revision.as_deref(), cancel)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(FileError::Skipped(reason)) => {
                tracing::warn!("Could not index {}: {}", key, reason);
                Err(IndexError::other(format!("{}: {}", key, reason)))
            }
            Err(FileError::Fatal(e)) => {
                tracing::error!("Indexing {} failed: {}", key, e);
                self.run_state.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Read, hash, chunk, embed and store one file
    ///
    /// Old points are deleted before the new batch is upserted, and the record
    /// is only written after the upsert succeeded.
    pub(crate) async fn process_file(
        &self,
        path: &Path,
        key: &str,
        force: bool,
        revision: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, FileError> {
        let Some(_guard) = PathGuard::try_acquire(&self.busy_paths, key) else {
            tracing::debug!("{} is already being processed", key);
            return Ok(FileOutcome::InFlight);
        };
        check_cancelled!(cancel);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| FileError::Skipped(format!("failed to read file: {}", e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| FileError::Skipped("file is not valid UTF-8".to_string()))?;
        let hash = content_hash(&content);

        let previous = self.hash_cache.read().await.get_record(key).cloned();
        if !force
            && let Some(record) = &previous
            && record.content_hash == hash
        {
            tracing::debug!("Unchanged: {}", key);
            return Ok(FileOutcome::Unchanged);
        }

        let chunks = self.chunker.split(&content, key);
        let chunk_count = chunks.len();
        tracing::debug!("Split {} into {} chunks", key, chunk_count);

        let points = if chunks.is_empty() {
            Vec::new()
        } else {
            let dimension = match self.ensure_collection(cancel).await {
                Ok(dimension) => dimension,
                Err(IndexError::Embedding(e)) if e.is_cancelled() => {
                    return Ok(FileOutcome::Cancelled);
                }
                Err(e) => return Err(FileError::Fatal(e)),
            };

            let mut points = Vec::with_capacity(chunk_count);
            for chunk in chunks {
                check_cancelled!(cancel);
                let embedded = self
                    .embedding_provider
                    .generate_embedding(&chunk.content, cancel)
                    .await
                    .and_then(|vector| match vector.len() {
                        len if len == dimension => Ok(vector),
                        actual => Err(EmbeddingError::DimensionMismatch {
                            expected: dimension,
                            actual,
                        }),
                    });
                match embedded {
                    Ok(vector) => points.push(Point::from_chunk(chunk, vector)),
                    Err(e) if e.is_cancelled() => return Ok(FileOutcome::Cancelled),
                    Err(e) => {
                        tracing::warn!(
                            "Dropping chunk {}:{}-{}: {}",
                            key,
                            chunk.line_start,
                            chunk.line_end,
                            e
                        );
                    }
                }
            }

            if points.is_empty() {
                tracing::warn!("No embeddings produced for {}, keeping previous state", key);
                return Ok(FileOutcome::NoPoints {
                    chunks: chunk_count,
                });
            }
            points
        };
        check_cancelled!(cancel);

        // Strictly ordered: drop the previous version, then write the new one
        let had_points = previous.as_ref().is_some_and(|r| r.point_count > 0);
        if !points.is_empty() || had_points {
            self.delete_points_for(key)
                .await
                .map_err(IndexError::from)?;
        }
        let point_count = points.len();
        if !points.is_empty() {
            self.vector_store
                .upsert(self.collection_name(), points)
                .await
                .map_err(IndexError::from)?;
        }

        {
            let mut cache = self.hash_cache.write().await;
            cache.update_record(FileIndexRecord {
                file_path: key.to_string(),
                content_hash: hash,
                last_indexed_revision: revision.map(String::from),
                point_count,
            });
            if let Some(root) = &self.workspace {
                refresh_vector_count(&mut cache, root, false);
            }
            if let Err(e) = cache.save(&self.cache_path) {
                tracing::warn!("Failed to save index state: {}", e);
            }
        }

        tracing::debug!("Indexed {} ({} points)", key, point_count);
        Ok(FileOutcome::Indexed {
            chunks: chunk_count,
            points: point_count,
        })
    }
}
