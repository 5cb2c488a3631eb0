use super::ast_parser::AstParser;
use crate::types::Chunk;
use std::path::Path;
use uuid::Uuid;

/// Default window size of the line-based fallback
pub const DEFAULT_WINDOW_LINES: usize = 50;
/// Default advance of the line-based fallback (10 lines of overlap)
pub const DEFAULT_STEP_LINES: usize = 40;

/// Strategy for chunking code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Declarations captured by a syntax query, falling back to sliding windows
    Structural,
    /// Sliding windows only
    SlidingWindow,
}

#[derive(Debug, Clone)]
pub struct CodeChunker {
    strategy: ChunkStrategy,
    window: usize,
    step: usize,
}

impl CodeChunker {
    pub fn new(strategy: ChunkStrategy, window: usize, step: usize) -> Self {
        Self {
            strategy,
            window: window.max(1),
            step: step.clamp(1, window.max(1)),
        }
    }

    /// Structural chunking with 50-line windows advancing by 40 lines
    pub fn default_strategy() -> Self {
        Self::new(
            ChunkStrategy::Structural,
            DEFAULT_WINDOW_LINES,
            DEFAULT_STEP_LINES,
        )
    }

    /// Split file text into chunks. Deterministic for a fixed input apart from fallback ids.
    pub fn split(&self, content: &str, file_path: &str) -> Vec<Chunk> {
        if self.strategy == ChunkStrategy::Structural {
            let chunks = self.split_structural(content, file_path);
            if !chunks.is_empty() {
                return chunks;
            }
        }
        self.split_sliding_window(content, file_path)
    }

    /// Declaration chunks, or nothing when the file has no usable grammar
    fn split_structural(&self, content: &str, file_path: &str) -> Vec<Chunk> {
        let Some(extension) = Path::new(file_path).extension().and_then(|e| e.to_str()) else {
            return Vec::new();
        };

        let spans = match AstParser::new(extension).and_then(|mut p| p.declarations(content)) {
            Ok(spans) => spans,
            Err(e) => {
                tracing::debug!(
                    "Structural chunking unavailable for {}: {:#}, using line windows",
                    file_path,
                    e
                );
                return Vec::new();
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        let mut consumed_until = 0usize;
        let mut last_rows: Option<(usize, usize)> = None;

        for span in spans {
            // Nested inside an already emitted declaration
            if span.start_byte < consumed_until {
                continue;
            }
            consumed_until = span.end_byte;

            if last_rows == Some((span.start_row, span.end_row)) {
                continue;
            }
            last_rows = Some((span.start_row, span.end_row));

            let end = (span.end_row + 1).min(lines.len());
            if span.start_row >= end {
                continue;
            }
            let text = lines[span.start_row..end].join("\n");
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            let line_start = span.start_row + 1;
            let line_end = end;
            chunks.push(Chunk {
                id: stable_chunk_id(file_path, line_start, line_end),
                file_path: file_path.to_string(),
                content: text.to_string(),
                line_start,
                line_end,
            });
        }

        chunks
    }

    /// Fixed windows of `window` lines advancing by `step`; blank windows are dropped
    fn split_sliding_window(&self, content: &str, file_path: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();
        let mut start_idx = 0;

        while start_idx < lines.len() {
            let end_idx = (start_idx + self.window).min(lines.len());
            let text = lines[start_idx..end_idx].join("\n");
            let text = text.trim();

            if !text.is_empty() {
                chunks.push(Chunk {
                    id: Uuid::new_v4().to_string(),
                    file_path: file_path.to_string(),
                    content: text.to_string(),
                    line_start: start_idx + 1,
                    line_end: end_idx,
                });
            }

            if end_idx >= lines.len() {
                break;
            }
            start_idx += self.step;
        }

        chunks
    }
}

impl Default for CodeChunker {
    fn default() -> Self {
        Self::default_strategy()
    }
}

/// Id derived from path and position so re-indexing the same span reuses it
pub fn stable_chunk_id(file_path: &str, line_start: usize, line_end: usize) -> String {
    let name = format!("{}:{}-{}", file_path, line_start, line_end);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}
