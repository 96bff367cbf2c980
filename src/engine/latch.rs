// src/engine/latch.rs

//! Counting latch used for blocking-wait coordination.
//!
//! Backs both the caller-facing wait latch (count = number of non-deferred
//! tasks) and the per-task [`FinishSignal`](crate::FinishSignal) (count = 1).

use std::sync::{Condvar, Mutex};

/// A condvar-backed countdown latch.
///
/// The count only ever decreases; once it reaches zero every current and
/// future [`wait`](CountLatch::wait) returns immediately. Counting down an
/// already-open latch is a no-op, which makes one-shot signals idempotent.
pub(crate) struct CountLatch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl CountLatch {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Decrement the count, waking all waiters when it reaches zero.
    pub(crate) fn count_down(&self) {
        let mut count = self.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.zero.notify_all();
            }
        }
    }

    /// Block the calling thread until the count reaches zero.
    pub(crate) fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            count = self.zero.wait(count).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_count_latch_is_open_immediately() {
        let latch = CountLatch::new(0);
        latch.wait();
    }

    #[test]
    fn wait_returns_after_all_countdowns() {
        let latch = Arc::new(CountLatch::new(2));

        let l = Arc::clone(&latch);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            l.count_down();
            l.count_down();
        });

        latch.wait();
        t.join().unwrap();
    }

    #[test]
    fn counting_down_an_open_latch_is_a_noop() {
        let latch = CountLatch::new(1);
        latch.count_down();
        latch.count_down();
        latch.wait();
    }
}
