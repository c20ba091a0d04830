use std::sync::{Mutex, PoisonError};

use crate::task::Progress;

/// Batch progress shared by the running tasks.
///
/// The counter only moves through [`ProgressTracker::complete_one`].
#[derive(Debug)]
pub struct ProgressTracker {
    state: Mutex<Progress>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(Progress::new(total)),
        }
    }

    /// Marks one task as completed and passes the new snapshot to `notify`
    /// while the lock is still held, so snapshots are observed in order.
    pub fn complete_one(&self, notify: impl FnOnce(Progress)) -> Progress {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(state.completed < state.total, "more completions than tasks");
        state.completed += 1;
        let snapshot = *state;
        notify(snapshot);
        snapshot
    }

    pub fn snapshot(&self) -> Progress {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
