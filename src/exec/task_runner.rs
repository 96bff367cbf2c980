// src/exec/task_runner.rs

//! Per-task execution wrapper.
//!
//! Runs one task's full lifecycle on a worker thread: start hook, body,
//! finish hook. Synchronous bodies complete on return; asynchronous bodies
//! park the worker on a one-shot signal until some thread calls `finish()`,
//! trading pool capacity for a simple completion protocol.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, error};

use crate::dag::NodeId;
use crate::engine::{Coordinator, TaskOutcome};
use crate::task::{FinishSignal, InitTask, TaskMeta};
use crate::types::TaskMode;

pub(crate) fn run_task<C: Send + Sync + 'static>(coordinator: Arc<Coordinator<C>>, id: NodeId) {
    let (meta, task) = coordinator.task_handle(id);

    coordinator.on_start(id);

    let result = match task {
        // The synthetic root has no body.
        None => Ok(()),
        Some(task) => run_body(&coordinator, &meta, task),
    };

    let outcome = match result {
        Ok(()) => TaskOutcome::Success,
        Err(err) => {
            let rendered = format!("{err:#}");
            error!(task = %meta.name, error = %rendered, "task body failed");
            TaskOutcome::Failed(rendered)
        }
    };

    coordinator.on_finish(id, outcome);
}

fn run_body<C: Send + Sync + 'static>(
    coordinator: &Arc<Coordinator<C>>,
    meta: &TaskMeta,
    task: Arc<dyn InitTask<C>>,
) -> anyhow::Result<()> {
    let ctx = coordinator.context();

    match meta.mode {
        TaskMode::Sync => contained(|| task.run(ctx)),
        TaskMode::Async => {
            let (signal, waiter) = FinishSignal::new();
            contained(|| task.run_async(ctx, signal))?;
            debug!(task = %meta.name, "body returned; awaiting completion signal");
            waiter.wait();
            Ok(())
        }
    }
}

/// Run a body, converting panics into errors so an unwinding worker can
/// never leave the latch or barrier stuck.
fn contained(body: impl FnOnce() -> anyhow::Result<()>) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(panic) => Err(anyhow!("task body panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
