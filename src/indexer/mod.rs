//! File discovery and content-aware chunking
//!
//! Walks a workspace for candidate files and splits file text into chunks,
//! preferring declarations captured by a tree-sitter query and falling back to
//! overlapping line windows.

mod ast_parser;
mod chunker;
mod file_walker;

pub use ast_parser::{AstParser, DeclarationSpan};
pub use chunker::{
    ChunkStrategy, CodeChunker, DEFAULT_STEP_LINES, DEFAULT_WINDOW_LINES, stable_chunk_id,
};
pub use file_walker::FileWalker;

use sha2::{Digest, Sha256};

/// SHA-256 of file text, hex encoded
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
