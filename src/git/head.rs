use super::RevisionSource;
use anyhow::{Context, Result};
use git2::{ErrorCode, Repository};
use std::path::Path;

/// Reads the commit id `HEAD` points at
#[derive(Debug, Clone, Copy, Default)]
pub struct GitRevisionSource;

impl GitRevisionSource {
    pub fn new() -> Self {
        Self
    }

    /// Discover the repository containing `path` and resolve `HEAD`
    ///
    /// Returns `Ok(None)` for a repository without commits.
    pub fn head_commit(path: &Path) -> Result<Option<String>> {
        let repo = Repository::discover(path).context("Failed to discover git repository")?;

        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None);
            }
            Err(e) => return Err(e).context("Failed to resolve HEAD"),
        };

        let commit = head
            .peel_to_commit()
            .context("HEAD does not point at a commit")?;
        Ok(Some(commit.id().to_string()))
    }
}

impl RevisionSource for GitRevisionSource {
    fn current_revision(&self, workspace: &Path) -> Option<String> {
        match Self::head_commit(workspace) {
            Ok(revision) => revision,
            Err(e) => {
                tracing::debug!("No revision for {}: {:#}", workspace.display(), e);
                None
            }
        }
    }
}
