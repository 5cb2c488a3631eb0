use crate::types::{IndexStats, IndexStatus, RepoIndexState, StatusReport};

/// Derive the index status from stored state, with no side effects
///
/// `last_error` is the message of the last unrecoverable failure, if the
/// client is in the error state.
pub fn derive_status(
    has_workspace: bool,
    in_flight: bool,
    last_error: Option<&str>,
    state: Option<&RepoIndexState>,
    current_revision: Option<&str>,
) -> IndexStatus {
    if !has_workspace {
        return IndexStatus::NoWorkspace;
    }
    if in_flight {
        return IndexStatus::Indexing;
    }
    if last_error.is_some() {
        return IndexStatus::Error;
    }
    match state {
        None => IndexStatus::NotIndexed,
        Some(state) if state.vector_count == 0 => IndexStatus::NotIndexed,
        Some(state) if state.last_indexed_commit.as_deref() == current_revision => {
            IndexStatus::Ready
        }
        Some(_) => IndexStatus::Stale,
    }
}

/// Build the status object handed to UI and CLI layers
pub(crate) fn status_report(
    status: IndexStatus,
    last_error: Option<String>,
    state: Option<&RepoIndexState>,
) -> StatusReport {
    let stats = state.map(|s| IndexStats {
        vector_count: s.vector_count,
        last_commit: s.last_indexed_commit.clone(),
        repo_id: s.repo_id.clone(),
    });
    let message = match status {
        IndexStatus::Error => last_error,
        IndexStatus::NoWorkspace => Some("Open a folder to enable indexing".to_string()),
        _ => None,
    };
    StatusReport {
        status,
        stats,
        message,
    }
}
