// src/task.rs

//! Task descriptor contract.
//!
//! An initialization task declares its identity, execution mode, deferred
//! flag and dependency set; the scheduler resolves the declared identities
//! into graph edges once, at graph-build time.

use std::sync::Arc;

use crate::engine::latch::CountLatch;
use crate::engine::TaskName;
use crate::types::TaskMode;

/// A unit of initialization work managed by the runner.
///
/// Identity (`name`) must be unique within one run; other tasks refer to it
/// from their [`dependencies`](InitTask::dependencies) list.
///
/// The context type `C` is opaque to the scheduler: it is shared read-only
/// data handed to every body, with no synchronization contract beyond
/// `Send + Sync`.
pub trait InitTask<C>: Send + Sync {
    /// Stable unique identity used to resolve dependency references.
    fn name(&self) -> &str;

    /// How this task signals completion. Defaults to [`TaskMode::Sync`].
    fn mode(&self) -> TaskMode {
        TaskMode::Sync
    }

    /// A deferred task does not need to finish before [`run`] returns.
    ///
    /// The runner waits for all non-deferred tasks; deferred tasks (and
    /// anything depending on them) keep running in the background and still
    /// count towards the terminal `after_all` event.
    ///
    /// Default `false`.
    ///
    /// [`run`]: crate::InitRunner::run
    fn deferred(&self) -> bool {
        false
    }

    /// Identities of the tasks that must finish before this one starts.
    fn dependencies(&self) -> Vec<TaskName> {
        Vec::new()
    }

    /// Synchronous body; the task is complete when this returns.
    fn run(&self, ctx: &C) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Asynchronous body, invoked instead of [`run`](InitTask::run) when
    /// [`mode`](InitTask::mode) is [`TaskMode::Async`].
    ///
    /// The task is complete only once `done.finish()` has been invoked. That
    /// may happen synchronously inside the body, on a thread the body spawns,
    /// or anywhere else the signal handle is moved to.
    ///
    /// The default implementation delegates to the synchronous body and
    /// finishes immediately.
    fn run_async(&self, ctx: &C, done: FinishSignal) -> anyhow::Result<()> {
        let result = self.run(ctx);
        done.finish();
        result
    }
}

/// Read-only description of a task, handed to listener callbacks.
#[derive(Debug, Clone)]
pub struct TaskMeta {
    pub name: TaskName,
    pub mode: TaskMode,
    pub deferred: bool,
}

/// One-shot completion signal for [`TaskMode::Async`] tasks.
///
/// Cloneable and sendable; calling [`finish`](FinishSignal::finish) more than
/// once is a no-op.
#[derive(Clone)]
pub struct FinishSignal {
    latch: Arc<CountLatch>,
}

impl FinishSignal {
    pub(crate) fn new() -> (Self, SignalWaiter) {
        let latch = Arc::new(CountLatch::new(1));
        (
            Self {
                latch: Arc::clone(&latch),
            },
            SignalWaiter { latch },
        )
    }

    /// Mark the owning async task as finished.
    pub fn finish(&self) {
        self.latch.count_down();
    }
}

/// Blocking side of a [`FinishSignal`], held by the execution wrapper.
pub(crate) struct SignalWaiter {
    latch: Arc<CountLatch>,
}

impl SignalWaiter {
    /// Block the current thread until the signal fires.
    pub(crate) fn wait(&self) {
        self.latch.wait();
    }
}
