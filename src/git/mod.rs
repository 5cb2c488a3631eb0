//! Repository revision lookup used to tell a fresh index from a stale one
//!
//! Only the current revision identifier is read; branch and commit metadata
//! are not indexed.

/// HEAD lookup through libgit2
pub mod head;

pub use head::GitRevisionSource;

use std::path::Path;

/// Source of the current repository revision for a workspace
pub trait RevisionSource: Send + Sync {
    /// Current revision identifier, or `None` when the workspace has no
    /// repository or no commits yet
    fn current_revision(&self, workspace: &Path) -> Option<String>;
}

/// Fixed revision, for embedders that already track the revision themselves
#[derive(Debug, Clone, Default)]
pub struct StaticRevision(pub Option<String>);

impl StaticRevision {
    pub fn new(revision: impl Into<String>) -> Self {
        Self(Some(revision.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl RevisionSource for StaticRevision {
    fn current_revision(&self, _workspace: &Path) -> Option<String> {
        self.0.clone()
    }
}
