use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use initdag::{InitListener, TaskMeta};

/// A lifecycle event observed by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    BeforeAll,
    BeforeEach(String),
    AfterEach(String),
    AfterAll,
}

/// Listener that records every event in arrival order for assertions.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Index of the first occurrence of `event`, if any.
    pub fn position(&self, event: &ListenerEvent) -> Option<usize> {
        self.events.lock().unwrap().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &ListenerEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    /// Poll until `after_all` has been observed, for tests where the terminal
    /// event fires on a background thread after `run` has returned.
    pub fn wait_for_after_all(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count(&ListenerEvent::AfterAll) > 0 {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl InitListener for RecordingListener {
    fn before_all(&self) {
        self.events.lock().unwrap().push(ListenerEvent::BeforeAll);
    }

    fn before_each(&self, task: &TaskMeta) {
        self.events
            .lock()
            .unwrap()
            .push(ListenerEvent::BeforeEach(task.name.clone()));
    }

    fn after_each(&self, task: &TaskMeta) {
        self.events
            .lock()
            .unwrap()
            .push(ListenerEvent::AfterEach(task.name.clone()));
    }

    fn after_all(&self) {
        self.events.lock().unwrap().push(ListenerEvent::AfterAll);
    }
}
