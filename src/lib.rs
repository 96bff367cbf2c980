// src/lib.rs

//! Dependency-ordered task scheduler for application startup.
//!
//! A set of initialization tasks declare dependencies on one another and are
//! executed concurrently, in dependency order, on a worker pool sized from
//! the sync/async task mix. The caller blocks until every non-deferred task
//! has finished; deferred tasks and their dependents keep running in the
//! background and still drive the terminal listener event.
//!
//! The pieces:
//! - [`InitTask`]: the task descriptor contract (identity, mode, deferred
//!   flag, dependency set, body).
//! - [`InitRunnerBuilder`] / [`InitRunner`]: attach a context object and
//!   listeners, then run a task collection.
//! - [`InitListener`]: lifecycle callbacks (`before_all`, `before_each`,
//!   `after_each`, `after_all`).
//!
//! Graph problems (unresolved dependency, cycle, synchronous task depending
//! on a deferred synchronous one) surface as configuration errors before any
//! task executes.

pub mod errors;
pub mod listener;
pub mod logging;
pub mod task;
pub mod types;

mod dag;
mod engine;
mod exec;

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use tracing::{debug, info};

use crate::dag::TaskGraph;
use crate::engine::Coordinator;
use crate::engine::latch::CountLatch;
use crate::exec::pool::{WorkerPool, pool_size};

pub use crate::engine::TaskName;
pub use crate::errors::{InitdagError, Result};
pub use crate::listener::InitListener;
pub use crate::task::{FinishSignal, InitTask, TaskMeta};
pub use crate::types::TaskMode;

/// Builder for an [`InitRunner`]: a target context object plus zero or more
/// listener registrations.
pub struct InitRunnerBuilder<C> {
    context: C,
    listeners: Vec<Arc<dyn InitListener>>,
}

impl<C: Send + Sync + 'static> InitRunnerBuilder<C> {
    pub fn new(context: C) -> Self {
        Self {
            context,
            listeners: Vec::new(),
        }
    }

    /// Register a lifecycle listener. Listeners are invoked in registration
    /// order, possibly from arbitrary worker threads.
    pub fn add_listener(mut self, listener: Arc<dyn InitListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Finish the builder. The calling thread becomes the owning thread:
    /// [`InitRunner::run`] must later be invoked from it.
    pub fn build(self) -> InitRunner<C> {
        InitRunner {
            context: Arc::new(self.context),
            listeners: self.listeners,
            owner: thread::current().id(),
        }
    }
}

/// Runs a collection of [`InitTask`]s in dependency order.
pub struct InitRunner<C> {
    context: Arc<C>,
    listeners: Vec<Arc<dyn InitListener>>,
    owner: ThreadId,
}

impl<C: Send + Sync + 'static> InitRunner<C> {
    pub fn builder(context: C) -> InitRunnerBuilder<C> {
        InitRunnerBuilder::new(context)
    }

    /// Run the task graph and block until every non-deferred task has
    /// finished.
    ///
    /// Builds and validates the dependency graph, sizes the worker pool from
    /// the task mix, then executes tasks as their dependencies drain. The
    /// call returns once the wait latch opens; deferred tasks and their
    /// dependents continue in the background and still fire the terminal
    /// `after_all` event when the last of them finishes.
    ///
    /// A no-op on an empty collection. Fails with a configuration error
    /// before any task runs if the graph is invalid, with
    /// [`InitdagError::NotOwningThread`] when invoked from a thread other
    /// than the one that built the runner, and with
    /// [`InitdagError::InitFailed`] when a non-deferred task's body failed
    /// or was skipped because a dependency failed.
    pub fn run(&self, tasks: Vec<Arc<dyn InitTask<C>>>) -> Result<()> {
        if thread::current().id() != self.owner {
            return Err(InitdagError::NotOwningThread);
        }
        if tasks.is_empty() {
            debug!("no tasks to run");
            return Ok(());
        }

        let graph = TaskGraph::build(tasks)?;
        dag::validate(&graph)?;

        let (sync_count, async_count) = graph.mode_counts();
        let size = pool_size(sync_count, async_count, num_cpus::get());
        info!(
            tasks = graph.len() - 1,
            sync_tasks = sync_count,
            async_tasks = async_count,
            pool_core = size.core,
            pool_max = size.max,
            "starting initialization run"
        );

        let started = Instant::now();
        let wait_latch = Arc::new(CountLatch::new(graph.waiter_count()));
        let coordinator = Coordinator::new(
            graph,
            Arc::clone(&self.context),
            self.listeners.clone(),
            Arc::clone(&wait_latch),
            WorkerPool::new(size),
        );

        coordinator.start();
        wait_latch.wait();

        let failures = coordinator.take_failures();
        if !failures.is_empty() {
            return Err(InitdagError::InitFailed { failures });
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "blocking initialization complete"
        );
        Ok(())
    }
}
