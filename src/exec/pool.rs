// src/exec/pool.rs

//! Sized worker pool.
//!
//! Sizing follows the workload mix: a graph dominated by synchronous
//! (compute-shaped) tasks gets a small core with headroom, while a mix with
//! many asynchronous (wait-shaped) tasks gets a proportionally larger fixed
//! size, since each async task parks a worker until its signal fires.

use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, warn};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Backlog capacity between submission and worker pickup.
pub(crate) const QUEUE_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolSize {
    pub(crate) core: usize,
    pub(crate) max: usize,
}

/// Compute the pool size from the task mix.
///
/// With `ratio = sync / (sync + async)` above 0.8 the workload counts as
/// compute-bound: core `NCPU + 1`, max `2 * NCPU + 1`. Otherwise it counts
/// as I/O-bound and gets a fixed size of `NCPU * (async / sync + 1)`
/// (integer division; an all-async set divides by 1 instead of 0).
pub(crate) fn pool_size(sync_count: usize, async_count: usize, ncpu: usize) -> PoolSize {
    debug_assert!(sync_count + async_count > 0);

    let ratio = sync_count as f64 / (sync_count + async_count) as f64;
    if ratio > 0.8 {
        PoolSize {
            core: ncpu + 1,
            max: 2 * ncpu + 1,
        }
    } else {
        let size = ncpu * (async_count / sync_count.max(1) + 1);
        PoolSize {
            core: size,
            max: size,
        }
    }
}

/// Bounded pool of named worker threads with an on-demand ramp-up.
///
/// Threads are spawned per submission up to the core size, each taking the
/// submitted job as its first unit of work. Once the core is saturated jobs
/// queue in the backlog; a full backlog spins up extra workers up to the max
/// size, and those retire as soon as the backlog is empty. A full backlog at
/// max size spills the job onto a transient dedicated thread rather than
/// rejecting it, so a burst of ready tasks can never stall the run.
pub(crate) struct WorkerPool {
    shared: Arc<PoolShared>,
    size: PoolSize,
}

struct PoolShared {
    state: Mutex<PoolState>,
    backlog: Receiver<Job>,
}

struct PoolState {
    /// Submission side of the backlog; dropped on shutdown so that workers
    /// drain the queue and exit.
    tx: Option<Sender<Job>>,
    workers: usize,
    next_worker: usize,
}

impl WorkerPool {
    pub(crate) fn new(size: PoolSize) -> Self {
        let (tx, backlog) = bounded::<Job>(QUEUE_CAPACITY);
        debug!(
            core = size.core,
            max = size.max,
            "sized initialization worker pool"
        );
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    tx: Some(tx),
                    workers: 0,
                    next_worker: 1,
                }),
                backlog,
            }),
            size,
        }
    }

    /// Hand a job to the pool.
    pub(crate) fn submit(&self, job: Job) {
        let mut state = self.shared.state.lock().unwrap();

        let Some(tx) = state.tx.clone() else {
            warn!("job submitted after pool shutdown; running it on a transient thread");
            drop(state);
            spawn_transient(job);
            return;
        };

        if state.workers < self.size.core {
            self.spawn_worker(&mut state, job, true);
            return;
        }

        match tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                if state.workers < self.size.max {
                    self.spawn_worker(&mut state, job, false);
                } else {
                    warn!(
                        max = self.size.max,
                        "worker backlog full at maximum pool size; spilling job onto a transient thread"
                    );
                    drop(state);
                    spawn_transient(job);
                }
            }
            Err(TrySendError::Disconnected(job)) => {
                drop(state);
                spawn_transient(job);
            }
        }
    }

    /// Close the backlog; workers finish what is queued and exit.
    pub(crate) fn shutdown(&self) {
        self.shared.state.lock().unwrap().tx = None;
    }

    fn spawn_worker(&self, state: &mut PoolState, first: Job, keep_alive: bool) {
        let id = state.next_worker;
        state.next_worker += 1;
        state.workers += 1;

        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("initdag-worker-{id}"))
            .spawn(move || worker_loop(shared, first, keep_alive))
            .expect("failed to spawn initdag worker thread");
    }
}

fn worker_loop(shared: Arc<PoolShared>, first: Job, keep_alive: bool) {
    first();

    loop {
        let job = if keep_alive {
            match shared.backlog.recv() {
                Ok(job) => job,
                Err(_) => break,
            }
        } else {
            // Extra workers have a zero keep-alive: they retire as soon as
            // the backlog is empty.
            match shared.backlog.try_recv() {
                Ok(job) => job,
                Err(_) => break,
            }
        };
        job();
    }

    shared.state.lock().unwrap().workers -= 1;
}

fn spawn_transient(job: Job) {
    thread::Builder::new()
        .name("initdag-overflow".to_string())
        .spawn(job)
        .expect("failed to spawn initdag overflow thread");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::engine::latch::CountLatch;

    #[test]
    fn compute_bound_mix_gets_core_and_headroom() {
        // ratio = 8 / 9 ≈ 0.89 > 0.8
        let size = pool_size(8, 1, 4);
        assert_eq!(size, PoolSize { core: 5, max: 9 });
    }

    #[test]
    fn io_bound_mix_gets_fixed_proportional_size() {
        // ratio = 0.2; NCPU * (8 / 2 + 1) = 5 * NCPU
        let size = pool_size(2, 8, 4);
        assert_eq!(size, PoolSize { core: 20, max: 20 });
    }

    #[test]
    fn ratio_of_exactly_four_fifths_counts_as_io_bound() {
        // 8 / 10 is not strictly above the threshold; 2 / 8 rounds to 0.
        let size = pool_size(8, 2, 4);
        assert_eq!(size, PoolSize { core: 4, max: 4 });
    }

    #[test]
    fn all_async_set_does_not_divide_by_zero() {
        let size = pool_size(0, 4, 4);
        assert_eq!(size, PoolSize { core: 20, max: 20 });
    }

    #[test]
    fn submitted_jobs_all_run() {
        let pool = WorkerPool::new(PoolSize { core: 2, max: 4 });
        let counter = Arc::new(AtomicUsize::new(0));
        let latch = Arc::new(CountLatch::new(16));

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            let latch = Arc::clone(&latch);
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                latch.count_down();
            }));
        }

        latch.wait();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn backlog_overflow_spills_instead_of_rejecting() {
        // One worker that blocks until released, so everything else queues.
        let pool = WorkerPool::new(PoolSize { core: 1, max: 1 });
        let gate = Arc::new(CountLatch::new(1));
        let total = 1 + QUEUE_CAPACITY + 8;
        let done = Arc::new(CountLatch::new(total));

        {
            let gate = Arc::clone(&gate);
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || {
                gate.wait();
                done.count_down();
            }));
        }
        for _ in 0..total - 1 {
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || done.count_down()));
        }

        gate.count_down();
        done.wait();
        pool.shutdown();
    }
}
