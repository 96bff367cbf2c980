/// How a task signals its completion.
///
/// - `Sync`: the task is complete when its body returns.
/// - `Async`: the task is complete only once it invokes its
///   [`FinishSignal`](crate::FinishSignal), which may happen on any thread
///   after the body has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    Sync,
    Async,
}

impl Default for TaskMode {
    fn default() -> Self {
        TaskMode::Sync
    }
}

impl TaskMode {
    /// Returns `true` for [`TaskMode::Async`].
    pub fn is_async(self) -> bool {
        matches!(self, TaskMode::Async)
    }
}
