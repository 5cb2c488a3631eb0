//! In-process locking for indexing runs
//!
//! Two layers:
//! 1. A run flag: at most one full sweep per client, a second request is rejected
//! 2. Per-path guards: the same file is never processed by two tasks at once

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Lifecycle of full sweeps, owned by one client
#[derive(Debug, Default)]
pub(crate) struct RunState {
    in_flight: AtomicBool,
    /// Message of the last unrecoverable failure, cleared when a new run starts
    last_error: Mutex<Option<String>>,
}

impl RunState {
    /// Enter the indexing state, or `None` if a run is already in flight
    pub(crate) fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.set_error(None);
        Some(RunGuard {
            state: Arc::clone(self),
        })
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Enter the error state
    pub(crate) fn fail(&self, message: impl Into<String>) {
        self.set_error(Some(message.into()));
    }

    pub(crate) fn clear_error(&self) {
        self.set_error(None);
    }

    fn set_error(&self, value: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

/// Held for the duration of a sweep; leaving the indexing state on drop
pub(crate) struct RunGuard {
    state: Arc<RunState>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}

/// Paths currently being processed
pub(crate) type BusyPaths = Arc<Mutex<HashSet<String>>>;

/// Exclusive claim on one file path
pub(crate) struct PathGuard {
    path: String,
    busy: BusyPaths,
}

impl PathGuard {
    /// Claim `path`, or `None` if another task holds it
    pub(crate) fn try_acquire(busy: &BusyPaths, path: &str) -> Option<Self> {
        let inserted = busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string());
        inserted.then(|| Self {
            path: path.to_string(),
            busy: Arc::clone(busy),
        })
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.path);
    }
}
