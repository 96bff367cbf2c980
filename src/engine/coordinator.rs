// src/engine/coordinator.rs

//! The single serialization point of a run.
//!
//! Start/finish/submission handling all funnel through one mutex guarding
//! the graph edges and the shared counters, so concurrent finishes on
//! different workers cannot lose updates. Contention is limited to short
//! counter updates and edge-list mutation, so no finer-grained locking is
//! used.

use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::dag::{NodeId, TaskGraph, TaskState};
use crate::engine::TaskOutcome;
use crate::engine::barrier::CompletionBarrier;
use crate::engine::latch::CountLatch;
use crate::exec::pool::WorkerPool;
use crate::exec::task_runner;
use crate::listener::InitListener;
use crate::task::{InitTask, TaskMeta};

pub(crate) struct Coordinator<C> {
    /// Handle to hand out to pool jobs, wired at construction.
    self_handle: Weak<Self>,
    context: Arc<C>,
    listeners: Vec<Arc<dyn InitListener>>,
    wait_latch: Arc<CountLatch>,
    pool: WorkerPool,
    inner: Mutex<CoreState<C>>,
}

struct CoreState<C> {
    graph: TaskGraph<C>,
    barrier: CompletionBarrier,
    /// Failed or skipped non-deferred tasks, rendered for the run error.
    failures: Vec<String>,
}

impl<C: Send + Sync + 'static> Coordinator<C> {
    pub(crate) fn new(
        graph: TaskGraph<C>,
        context: Arc<C>,
        listeners: Vec<Arc<dyn InitListener>>,
        wait_latch: Arc<CountLatch>,
        pool: WorkerPool,
    ) -> Arc<Self> {
        let barrier = CompletionBarrier::new(graph.len());
        Arc::new_cyclic(|self_handle| Self {
            self_handle: self_handle.clone(),
            context,
            listeners,
            wait_latch,
            pool,
            inner: Mutex::new(CoreState {
                graph,
                barrier,
                failures: Vec::new(),
            }),
        })
    }

    /// Kick off the run by submitting the synthetic root; its completion
    /// transitively frees every dependency-free task.
    pub(crate) fn start(&self) {
        let root = self.inner.lock().unwrap().graph.root();
        self.execute(root);
    }

    /// Pool-submission hook. Serialized like the start/finish handlers, so
    /// submission order is deterministic relative to concurrent finishes.
    pub(crate) fn execute(&self, id: NodeId) {
        let mut inner = self.inner.lock().unwrap();
        self.submit_locked(&mut inner, id);
    }

    fn submit_locked(&self, state: &mut CoreState<C>, id: NodeId) {
        let node = state.graph.node_mut(id);
        debug_assert_eq!(node.state, TaskState::Waiting);
        node.state = TaskState::Submitted;
        debug!(task = %node.meta.name, "submitting task to worker pool");

        let coordinator = self
            .self_handle
            .upgrade()
            .expect("coordinator alive while submitting");
        self.pool
            .submit(Box::new(move || task_runner::run_task(coordinator, id)));
    }

    /// Start hook, called from the execution wrapper on a worker thread.
    pub(crate) fn on_start(&self, id: NodeId) {
        let mut inner = self.inner.lock().unwrap();

        let first_start = inner.barrier.mark_started();
        let node = inner.graph.node_mut(id);
        node.state = TaskState::Running;
        let meta = node.meta.clone();
        let is_root = inner.graph.is_root(id);

        if first_start {
            for listener in &self.listeners {
                listener.before_all();
            }
        }
        if !is_root {
            debug!(task = %meta.name, "task starting");
            for listener in &self.listeners {
                listener.before_each(&meta);
            }
        }
    }

    /// Finish hook: counts the task down, fires listener events, fails
    /// dependents on a failed outcome and submits every dependent whose
    /// dependency set has drained.
    pub(crate) fn on_finish(&self, id: NodeId, outcome: TaskOutcome) {
        let mut inner = self.inner.lock().unwrap();
        let state = &mut *inner;

        let node = state.graph.node_mut(id);
        node.state = TaskState::Completed;
        let meta = node.meta.clone();
        let is_root = state.graph.is_root(id);

        if !meta.deferred {
            self.wait_latch.count_down();
        }
        let mut all_done = state.barrier.mark_done();

        if !is_root {
            debug!(
                task = %meta.name,
                failed = matches!(outcome, TaskOutcome::Failed(_)),
                "task finished"
            );
            for listener in &self.listeners {
                listener.after_each(&meta);
            }
        }

        if let TaskOutcome::Failed(err) = &outcome {
            if !meta.deferred {
                state.failures.push(format!("{}: {}", meta.name, err));
            }
            all_done |= self.skip_dependents_locked(state, id);
        }

        if all_done {
            debug!("all tasks finished");
            for listener in &self.listeners {
                listener.after_all();
            }
            self.pool.shutdown();
        }

        // Propagate completion and submit the newly ready dependents.
        let after = state.graph.node(id).after.clone();
        for dependent in after {
            let dep_node = state.graph.node_mut(dependent);
            dep_node.pending_before.remove(&id);
            if dep_node.pending_before.is_empty() && dep_node.state == TaskState::Waiting {
                self.submit_locked(state, dependent);
            }
        }
    }

    /// Mark every not-yet-started transitive dependent of a failed task as
    /// finished-without-running, keeping latch and barrier consistent.
    fn skip_dependents_locked(&self, state: &mut CoreState<C>, failed: NodeId) -> bool {
        let failed_name = state.graph.node(failed).meta.name.clone();
        let mut stack = state.graph.node(failed).after.clone();
        let mut all_done = false;

        while let Some(id) = stack.pop() {
            let node = state.graph.node_mut(id);
            if node.state != TaskState::Waiting {
                continue;
            }
            node.state = TaskState::Completed;
            let meta = node.meta.clone();

            warn!(
                task = %meta.name,
                failed_task = %failed_name,
                "skipping dependent of failed task"
            );
            if !meta.deferred {
                self.wait_latch.count_down();
                state.failures.push(format!(
                    "{}: skipped because upstream task '{}' failed",
                    meta.name, failed_name
                ));
            }
            all_done |= state.barrier.mark_done();
            stack.extend(state.graph.node(id).after.iter().copied());
        }

        all_done
    }

    pub(crate) fn context(&self) -> &C {
        &self.context
    }

    /// Snapshot a task's metadata and body for the execution wrapper, so the
    /// body runs without the coordinator lock held.
    pub(crate) fn task_handle(&self, id: NodeId) -> (TaskMeta, Option<Arc<dyn InitTask<C>>>) {
        let inner = self.inner.lock().unwrap();
        let node = inner.graph.node(id);
        (node.meta.clone(), node.task.clone())
    }

    /// Drain the failure ledger once the wait latch has opened.
    pub(crate) fn take_failures(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().unwrap().failures)
    }
}
