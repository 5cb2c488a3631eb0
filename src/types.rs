use serde::{Deserialize, Serialize};

/// A contiguous span of a file chosen as the unit of embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable for structural chunks, fresh for fallback windows
    pub id: String,
    pub file_path: String,
    pub content: String,
    /// 1-based, inclusive
    pub line_start: usize,
    /// 1-based, inclusive
    pub line_end: usize,
}

/// Payload stored alongside every vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub file_path: String,
    pub content: String,
    pub line_start: usize,
    pub line_end: usize,
}

/// A chunk's embedding plus its text and location, as persisted in the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl Point {
    /// Combine a chunk with the vector produced for it
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            vector,
            payload: PointPayload {
                file_path: chunk.file_path,
                content: chunk.content,
                line_start: chunk.line_start,
                line_end: chunk.line_end,
            },
        }
    }
}

/// A search hit returned by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Distance metric of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

/// Filter accepted by `VectorStore::delete_where`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointFilter {
    /// All points whose payload `file_path` equals the given path
    FilePath(String),
}

/// Change-detection record, one per indexed file path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndexRecord {
    pub file_path: String,
    pub content_hash: String,
    #[serde(default)]
    pub last_indexed_revision: Option<String>,
    /// Points written for this path by the last successful index
    #[serde(default)]
    pub point_count: usize,
}

/// Cached per-repository summary used to answer "is the index fresh"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIndexState {
    pub repo_id: String,
    pub vector_count: usize,
    #[serde(default)]
    pub last_indexed_commit: Option<String>,
}

/// Derived index status. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexStatus {
    #[serde(rename = "no_workspace")]
    NoWorkspace,
    #[serde(rename = "notIndexed")]
    NotIndexed,
    #[serde(rename = "indexing")]
    Indexing,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "stale")]
    Stale,
    #[serde(rename = "error")]
    Error,
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IndexStatus::NoWorkspace => "no_workspace",
            IndexStatus::NotIndexed => "notIndexed",
            IndexStatus::Indexing => "indexing",
            IndexStatus::Ready => "ready",
            IndexStatus::Stale => "stale",
            IndexStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Statistics attached to a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub vector_count: usize,
    pub last_commit: Option<String>,
    pub repo_id: String,
}

/// Status object exposed to UI/CLI collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: IndexStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Options for a full workspace sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Re-embed every discovered file regardless of stored hashes
    pub force: bool,
}

/// How a sweep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Result of a full sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub outcome: RunOutcome,
    pub files_discovered: usize,
    /// Files whose points were written in this run
    pub files_indexed: usize,
    /// Files skipped because their content hash was unchanged
    pub files_unchanged: usize,
    pub files_failed: usize,
    pub files_removed: usize,
    pub chunks_created: usize,
    pub points_upserted: usize,
    pub duration_ms: u64,
    /// Non-fatal errors encountered
    #[serde(default)]
    pub errors: Vec<String>,
}

impl IndexReport {
    pub(crate) fn new(files_discovered: usize) -> Self {
        Self {
            outcome: RunOutcome::Completed,
            files_discovered,
            files_indexed: 0,
            files_unchanged: 0,
            files_failed: 0,
            files_removed: 0,
            chunks_created: 0,
            points_upserted: 0,
            duration_ms: 0,
            errors: Vec::new(),
        }
    }

    /// Files that were looked at, whatever the result
    pub fn files_processed(&self) -> usize {
        self.files_indexed + self.files_unchanged + self.files_failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == RunOutcome::Cancelled
    }

    /// First recorded error when nothing at all succeeded
    pub fn root_cause(&self) -> Option<&str> {
        if self.files_indexed == 0 && self.files_unchanged == 0 {
            self.errors.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Human readable "N files indexed, M skipped/failed"
    pub fn summary(&self) -> String {
        let skipped = self.files_discovered.saturating_sub(self.files_indexed);
        let mut out = format!(
            "{} files indexed, {} skipped/failed",
            self.files_indexed, skipped
        );
        if self.is_cancelled() {
            out.push_str(" (cancelled)");
        }
        out
    }
}

/// Result of running the per-file pipeline on one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Points were replaced for this path
    Indexed { chunks: usize, points: usize },
    /// Content hash matched the stored record
    Unchanged,
    /// No chunk produced an embedding; stored state left untouched
    NoPoints { chunks: usize },
    /// The same path is already being processed elsewhere
    InFlight,
    /// The path is filtered out by the discovery rules
    Excluded,
    /// Cancellation was requested before anything was written
    Cancelled,
}

/// Progress notification published while indexing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum IndexEvent {
    Started {
        total: usize,
    },
    FileProcessed {
        path: String,
        indexed: bool,
        processed: usize,
        total: usize,
    },
    Completed {
        report: IndexReport,
    },
    Cancelled {
        report: IndexReport,
    },
    Error {
        message: String,
    },
}

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub file_path: String,
    pub content: String,
    pub line_start: usize,
    pub line_end: usize,
}

impl From<ScoredPoint> for SearchHit {
    fn from(point: ScoredPoint) -> Self {
        Self {
            id: point.id,
            score: point.score,
            file_path: point.payload.file_path,
            content: point.payload.content,
            line_start: point.payload.line_start,
            line_end: point.payload.line_end,
        }
    }
}
