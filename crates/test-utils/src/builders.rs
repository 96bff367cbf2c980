#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use initdag::{FinishSignal, InitTask, TaskMode, TaskName};

/// Context handed to test task bodies: a thread-safe event log.
///
/// Clones share the same log, so a test can keep a handle after moving the
/// context into the runner.
#[derive(Default, Clone)]
pub struct TestContext {
    log: Arc<Mutex<Vec<String>>>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

type SyncBody = dyn Fn(&TestContext) -> anyhow::Result<()> + Send + Sync;
type AsyncBody = dyn Fn(&TestContext, FinishSignal) -> anyhow::Result<()> + Send + Sync;

/// Configurable task descriptor for tests.
///
/// With no explicit body, the synchronous body records the task name into the
/// [`TestContext`] log, which is enough for ordering assertions.
pub struct TestTask {
    name: String,
    mode: TaskMode,
    deferred: bool,
    deps: Vec<String>,
    body: Option<Arc<SyncBody>>,
    async_body: Option<Arc<AsyncBody>>,
}

impl InitTask<TestContext> for TestTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> TaskMode {
        self.mode
    }

    fn deferred(&self) -> bool {
        self.deferred
    }

    fn dependencies(&self) -> Vec<TaskName> {
        self.deps.clone()
    }

    fn run(&self, ctx: &TestContext) -> anyhow::Result<()> {
        match &self.body {
            Some(body) => body(ctx),
            None => {
                ctx.record(self.name.clone());
                Ok(())
            }
        }
    }

    fn run_async(&self, ctx: &TestContext, done: FinishSignal) -> anyhow::Result<()> {
        match &self.async_body {
            Some(body) => body(ctx, done),
            None => {
                let result = self.run(ctx);
                done.finish();
                result
            }
        }
    }
}

/// Builder for [`TestTask`].
pub struct TestTaskBuilder {
    task: TestTask,
}

impl TestTaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TestTask {
                name: name.to_string(),
                mode: TaskMode::Sync,
                deferred: false,
                deps: Vec::new(),
                body: None,
                async_body: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.deps.push(dep.to_string());
        self
    }

    pub fn deferred(mut self, val: bool) -> Self {
        self.task.deferred = val;
        self
    }

    pub fn body(
        mut self,
        f: impl Fn(&TestContext) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.task.body = Some(Arc::new(f));
        self
    }

    /// Set an asynchronous body; also switches the task to [`TaskMode::Async`].
    pub fn async_body(
        mut self,
        f: impl Fn(&TestContext, FinishSignal) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.task.mode = TaskMode::Async;
        self.task.async_body = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Arc<dyn InitTask<TestContext>> {
        Arc::new(self.task)
    }
}
