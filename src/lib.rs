//! # Code Sage - Incremental Semantic Indexing for Source Trees
//!
//! Walks a workspace, splits files into chunks, embeds each chunk through a
//! pluggable provider and keeps a vector collection in sync with the files on
//! disk. Re-indexing only touches files whose content hash changed.
//!
//! ## Key Features
//!
//! - **Incremental Indexing**: SHA-256 content hashes persisted across restarts
//! - **Structural Chunking**: Tree-sitter declarations with a sliding-window fallback
//! - **Pluggable Embeddings**: Ollama, OpenAI and Gemini over HTTP
//! - **Pluggable Storage**: Qdrant (external server, default) or in-memory
//! - **Safe Concurrency**: one sweep at a time, per-file guards, cooperative cancellation
//! - **Derived Status**: `notIndexed`, `indexing`, `ready`, `stale`, `error` from stored state
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────┐
//!        │ IndexClient  │  (sweep, index_file, status, search)
//!        └──────┬───────┘
//!               │
//!   ┌───────────┼──────────────┬───────────────┐
//!   │           │              │               │
//! ┌─▼──────┐ ┌──▼────────┐ ┌───▼──────────┐ ┌──▼─────────┐
//! │Indexer │ │Embedding  │ │ VectorStore  │ │ HashCache  │
//! │walk +  │ │Provider   │ │ Qdrant /     │ │ (persisted │
//! │chunk   │ │(HTTP)     │ │ memory       │ │  JSON)     │
//! └────────┘ └───────────┘ └──────────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`client`]: The indexing state machine and query API
//! - [`indexer`]: File walking, AST parsing and code chunking
//! - [`embedding`]: Embedding provider trait and HTTP backends
//! - [`vector_db`]: Vector store trait with Qdrant and in-memory backends
//! - [`cache`]: Persistent change-detection store
//! - [`git`]: Current-revision lookup
//! - [`config`]: Configuration with TOML files and environment overrides
//! - [`types`]: Chunks, points, records, reports and events
//! - [`error`]: Error types
//! - [`paths`]: Platform-specific config and cache locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use code_sage::{Config, IndexClient, IndexOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = IndexClient::with_config(Config::new()?)?;
//!     let report = client
//!         .index_workspace(IndexOptions::default(), CancellationToken::new())
//!         .await?;
//!     println!("{}", report.summary());
//!
//!     for hit in client.search("parse config file", 5, &CancellationToken::new()).await? {
//!         println!("{}:{}-{} ({:.2})", hit.file_path, hit.line_start, hit.line_end, hit.score);
//!     }
//!     Ok(())
//! }
//! ```

/// Persistent hash cache for tracking file changes across restarts
pub mod cache;

/// Indexing client: sweeps, single-file updates, status and search
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding providers (Ollama, OpenAI, Gemini)
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Git revision lookup used for staleness detection
pub mod git;

/// Glob matching shared by discovery filters
pub mod glob_utils;

/// File walking, code chunking, and AST parsing
pub mod indexer;

/// Platform-specific config and cache directories
pub mod paths;

/// Core data types shared across modules
pub mod types;

/// Vector store abstraction supporting Qdrant and an in-memory backend
pub mod vector_db;

pub use client::{IndexClient, derive_status};
pub use config::Config;
pub use error::IndexError;
pub use types::{
    FileOutcome, IndexEvent, IndexOptions, IndexReport, IndexStatus, SearchHit, StatusReport,
};
