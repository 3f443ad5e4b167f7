//! Isolated worker pool for scope-confined task execution.
//!
//! Each pool owns its worker threads and a bounded pending queue, so one
//! scope's slow tasks cannot occupy the submitting thread or another scope's
//! workers. Dispatch follows the classic saturation ladder: fill the core
//! workers, then the queue, then grow to the maximum thread count, then
//! reject. Workers above the core count exit after sitting idle for the
//! configured keep-alive.

use crate::domain::config::PoolParams;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Rejection returned when the queue is full and the pool is at its
/// maximum thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSaturated;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Job>,
    live_workers: u32,
    shutdown: bool,
}

struct PoolShared {
    params: PoolParams,
    state: Mutex<PoolState>,
    work_ready: Condvar,
}

impl PoolShared {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Bounded worker pool dedicated to one scope.
pub struct IsolatedPool {
    name: String,
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for IsolatedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedPool")
            .field("name", &self.name)
            .field("params", &self.shared.params)
            .finish_non_exhaustive()
    }
}

impl IsolatedPool {
    /// Create an empty pool. Workers are spawned lazily on dispatch.
    pub fn new(name: impl Into<String>, params: PoolParams) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(PoolShared {
                params,
                state: Mutex::new(PoolState::default()),
                work_ready: Condvar::new(),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Hand a job to the pool without waiting for it to run.
    ///
    /// Accepts by, in order: starting a core worker, queueing, or starting
    /// a worker above the core count. Rejects once the queue is full and
    /// the pool is at its maximum thread count.
    pub fn dispatch(&self, job: Job) -> Result<(), PoolSaturated> {
        let params = self.shared.params;
        let mut state = self.shared.lock_state();
        if state.shutdown {
            return Err(PoolSaturated);
        }
        if state.live_workers < params.core_threads {
            state.queue.push_back(job);
            self.spawn_worker(&mut state, true);
        } else if (state.queue.len() as u32) < params.queue_capacity {
            state.queue.push_back(job);
            self.shared.work_ready.notify_one();
        } else if state.live_workers < params.max_threads {
            state.queue.push_back(job);
            self.spawn_worker(&mut state, false);
        } else {
            return Err(PoolSaturated);
        }
        Ok(())
    }

    /// Number of live worker threads.
    pub fn live_workers(&self) -> u32 {
        self.shared.lock_state().live_workers
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    fn spawn_worker(&self, state: &mut PoolState, is_core: bool) {
        let shared = Arc::clone(&self.shared);
        let builder = std::thread::Builder::new().name(format!("{}-worker", self.name));
        match builder.spawn(move || worker_loop(&shared, is_core)) {
            Ok(handle) => {
                state.live_workers += 1;
                let mut handles = match self.handles.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                handles.push(handle);
            }
            Err(error) => {
                // Leave the job queued; an existing worker will pick it up.
                tracing::warn!(pool = %self.name, %error, "failed to spawn pool worker");
                self.shared.work_ready.notify_one();
            }
        }
    }
}

fn worker_loop(shared: &PoolShared, is_core: bool) {
    let keep_alive = shared.params.keep_alive;
    let mut state = shared.lock_state();
    loop {
        if let Some(job) = state.queue.pop_front() {
            drop(state);
            // Jobs are panic-wrapped by the dispatcher; this is a last
            // resort so a rogue job cannot take the worker down with the
            // live count still held.
            let _ = panic::catch_unwind(AssertUnwindSafe(job));
            state = shared.lock_state();
            continue;
        }
        if state.shutdown {
            break;
        }
        if is_core {
            state = match shared.work_ready.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        } else {
            let (guard, timeout) = match shared.work_ready.wait_timeout(state, keep_alive) {
                Ok(result) => result,
                Err(poisoned) => poisoned.into_inner(),
            };
            state = guard;
            if timeout.timed_out() && state.queue.is_empty() {
                break;
            }
        }
    }
    state.live_workers -= 1;
}

impl Drop for IsolatedPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock_state();
            state.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        let handles = {
            let mut handles = match self.handles.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *handles)
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn params(core: u32, max: u32, capacity: u32, keep_alive: Duration) -> PoolParams {
        PoolParams {
            core_threads: core,
            max_threads: max,
            queue_capacity: capacity,
            keep_alive,
        }
    }

    #[test]
    fn test_dispatch_runs_job() {
        let pool = IsolatedPool::new("test", params(1, 1, 1, Duration::from_millis(20)));
        let (tx, rx) = mpsc::channel();

        pool.dispatch(Box::new(move || {
            let _ = tx.send(42);
        }))
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);
    }

    #[test]
    fn test_jobs_run_off_the_dispatching_thread() {
        let pool = IsolatedPool::new("test", params(1, 1, 1, Duration::from_millis(20)));
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();

        pool.dispatch(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }))
        .unwrap();

        let worker = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_saturation_rejects() {
        let pool = IsolatedPool::new("test", params(1, 1, 1, Duration::from_millis(20)));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        // Occupy the single worker.
        pool.dispatch(Box::new(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }))
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        // Fill the queue.
        pool.dispatch(Box::new(|| {})).unwrap();

        // Worker busy, queue full, no room to grow.
        assert_eq!(pool.dispatch(Box::new(|| {})), Err(PoolSaturated));

        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_grows_past_core_when_queue_is_full() {
        let pool = IsolatedPool::new("test", params(1, 2, 1, Duration::from_millis(20)));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let (started_tx, started_rx) = mpsc::channel();

        // Two blocking jobs plus one queued: the second blocking job forces
        // a worker above the core count.
        for _ in 0..2 {
            let started = started_tx.clone();
            let release = Arc::clone(&release_rx);
            pool.dispatch(Box::new(move || {
                let _ = started.send(());
                let _ = release.lock().unwrap().recv();
            }))
            .unwrap();
        }
        pool.dispatch(Box::new(|| {})).unwrap();

        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(pool.live_workers(), 2);

        // Fourth dispatch has nowhere to go.
        assert_eq!(pool.dispatch(Box::new(|| {})), Err(PoolSaturated));

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_excess_workers_exit_after_keep_alive() {
        let pool = IsolatedPool::new("test", params(1, 2, 1, Duration::from_millis(20)));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));

        for _ in 0..2 {
            let release = Arc::clone(&release_rx);
            pool.dispatch(Box::new(move || {
                let _ = release.lock().unwrap().recv();
            }))
            .unwrap();
        }
        pool.dispatch(Box::new(|| {})).unwrap();
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();

        // Give the excess worker time to drain the queue and idle out.
        std::thread::sleep(Duration::from_millis(300));
        assert!(pool.live_workers() <= 1);
    }

    #[test]
    fn test_panicking_job_does_not_kill_the_pool() {
        let pool = IsolatedPool::new("test", params(1, 1, 2, Duration::from_millis(20)));
        let (tx, rx) = mpsc::channel();

        pool.dispatch(Box::new(|| panic!("job blew up"))).unwrap();
        pool.dispatch(Box::new(move || {
            let _ = tx.send(());
        }))
        .unwrap();

        // The worker survives the panic and runs the next job.
        rx.recv_timeout(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_drop_joins_workers() {
        let pool = IsolatedPool::new("test", params(2, 2, 4, Duration::from_millis(20)));
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let tx = tx.clone();
            pool.dispatch(Box::new(move || {
                let _ = tx.send(());
            }))
            .unwrap();
        }
        drop(pool);
        drop(tx);

        // Queued jobs are drained before shutdown completes.
        assert_eq!(rx.iter().count(), 4);
    }
}
