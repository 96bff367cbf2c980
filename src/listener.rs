// src/listener.rs

//! Lifecycle listener interface.

use crate::task::TaskMeta;

/// Observer of initialization lifecycle events.
///
/// All callbacks may be invoked on arbitrary worker threads, so
/// implementations must be thread-safe. For a given task, `before_each`
/// strictly precedes `after_each`; `before_all` precedes every `before_each`
/// and `after_all` follows every `after_each`, each firing exactly once per
/// run.
pub trait InitListener: Send + Sync {
    /// Fired once, before the first task starts.
    fn before_all(&self) {}

    /// Fired before each task's body runs.
    fn before_each(&self, task: &TaskMeta) {
        let _ = task;
    }

    /// Fired after each task finishes.
    fn after_each(&self, task: &TaskMeta) {
        let _ = task;
    }

    /// Fired once, after every task (including deferred ones) has finished.
    fn after_all(&self) {}
}
