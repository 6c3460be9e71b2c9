//! Static worker-pool backend.
//!
//! This module contains the engine behind the thread-pool flavoured
//! executor:
//! - [`ThreadPoolBackend`]: owns the worker threads, the shared work queue
//!   and the lifecycle state machine,
//! - [`ThreadPoolBuilder`]: configures and builds pools,
//! - [`PoolStatus`]: the lifecycle states and their transition table,
//! - [`current_worker`]: identifies pool workers from inside work items.
//!
//! A fixed number of OS threads race to pop from one shared FIFO. There is
//! no affinity, no stealing and no priority. Blocking is always explicit:
//! [`Backend::wait`] parks the calling thread until the pool is quiescent.
//!
//! # Synchronization
//!
//! The status and the in-flight counter live behind a single mutex. Both
//! condition variables (one waking workers, one waking the host blocked in
//! `wait`) are paired with that mutex, so a status change and the wake-up
//! it triggers can never be observed out of order. Enqueueing pushes under
//! the same mutex, which makes "is the pool running?" and "push the item"
//! one atomic step.

mod builder;
mod status;
mod worker;

pub use builder::{ThreadPoolBuilder, ThreadPoolConfig};
pub use status::PoolStatus;
pub use worker::{WorkerId, current_worker};

use crate::backend::{Backend, BulkFn, Job};
use crate::error::{ExecError, Result};
use crate::executor::WorkName;
use crate::index::Shape;
use crate::queue::ConcurrentQueue;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

/// Source of process-unique pool identifiers.
static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Status plus in-flight counter, guarded together.
pub(crate) struct PoolState {
    pub(crate) status: PoolStatus,

    /// Items claimed by a worker and not finished yet.
    pub(crate) in_flight: usize,
}

impl PoolState {
    /// Applies a transition if the table allows it.
    fn transition(&mut self, pool: usize, next: PoolStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(pool, from = %self.status, to = %next, "rejected illegal status transition");
            return false;
        }

        debug!(pool, from = %self.status, to = %next, "pool status changed");
        self.status = next;
        true
    }
}

/// State shared between the backend handle and its worker threads.
pub(crate) struct Shared {
    pub(crate) id: usize,
    pub(crate) queue: ConcurrentQueue<Job>,
    pub(crate) state: Mutex<PoolState>,

    /// Wakes parked workers.
    pub(crate) wake_workers: Condvar,

    /// Wakes a host blocked in `wait`.
    pub(crate) wake_host: Condvar,

    /// Number of work items that panicked.
    pub(crate) panicked: AtomicUsize,
}

/// A fixed-size pool of worker threads sharing one FIFO queue.
///
/// The pool is created idle. [`Backend::start`] spawns the workers,
/// [`Backend::join`] is the only operation that reclaims them. Most users
/// go through [`StaticThreadPool`](crate::StaticThreadPool), which drives
/// the lifecycle automatically.
pub struct ThreadPoolBackend {
    shared: Arc<Shared>,
    config: ThreadPoolConfig,

    /// Join handles of the running workers.
    ///
    /// Also serializes `start` and `join`.
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolBackend {
    /// Creates an idle pool that will run `num_workers` threads.
    ///
    /// A pool with zero workers is accepted but can never make progress.
    pub fn new(num_workers: usize) -> Self {
        ThreadPoolBuilder::new()
            .worker_threads(num_workers)
            .build_backend()
    }

    pub(crate) fn with_config(config: ThreadPoolConfig) -> Self {
        let shared = Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            queue: ConcurrentQueue::new(),
            state: Mutex::new(PoolState {
                status: PoolStatus::Idle,
                in_flight: 0,
            }),
            wake_workers: Condvar::new(),
            wake_host: Condvar::new(),
            panicked: AtomicUsize::new(0),
        };

        Self {
            shared: Arc::new(shared),
            config,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Process-unique identifier of this pool, as found in [`WorkerId::pool`].
    pub fn id(&self) -> usize {
        self.shared.id
    }

    pub fn num_workers(&self) -> usize {
        self.config.worker_threads
    }

    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Number of spawned and not yet joined worker threads.
    pub fn live_workers(&self) -> usize {
        self.handles.lock().len()
    }

    /// Number of claimed work items that have not finished.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight
    }

    /// Number of queued, unclaimed work items.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Number of fire-and-forget items that panicked so far.
    pub fn panicked_jobs(&self) -> usize {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    /// Decides whether work may be queued in the given state.
    ///
    /// Outside threads may only submit while the pool is running. The pool's
    /// own workers may also submit while a host waits, since that work is
    /// part of what is being drained.
    fn admit(&self, state: &PoolState) -> Result<()> {
        match state.status {
            PoolStatus::Running => Ok(()),
            PoolStatus::Waiting if self.is_current() => Ok(()),
            status => Err(ExecError::NotRunning {
                backend: self.name(),
                status,
            }),
        }
    }

    /// Tells the workers spawned so far to exit after a failed start.
    fn abort_start(&self, err: std::io::Error) -> ExecError {
        let mut state = self.shared.state.lock();
        state.transition(self.shared.id, PoolStatus::Error);
        self.shared.wake_workers.notify_all();
        ExecError::Spawn(err)
    }
}

impl Backend for ThreadPoolBackend {
    fn name(&self) -> &'static str {
        "thread-pool"
    }

    fn start(&self) -> Result<()> {
        let mut handles = self.handles.lock();

        if self.shared.state.lock().status != PoolStatus::Idle {
            trace!(pool = self.shared.id, "start ignored, pool not idle");
            return Ok(());
        }

        if self.config.worker_threads == 0 {
            warn!(pool = self.shared.id, "starting a pool without workers; queued work will never run");
        }

        for index in 0..self.config.worker_threads {
            let mut builder =
                thread::Builder::new().name(format!("{}-{}", self.config.thread_name, index));
            if let Some(size) = self.config.stack_size {
                builder = builder.stack_size(size);
            }

            let shared = self.shared.clone();
            match builder.spawn(move || worker::run(shared, index)) {
                Ok(handle) => handles.push(handle),
                Err(err) => return Err(self.abort_start(err)),
            }
        }

        self.shared
            .state
            .lock()
            .transition(self.shared.id, PoolStatus::Running);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.shared.state.lock();

        if matches!(state.status, PoolStatus::Running | PoolStatus::Waiting) {
            state.transition(self.shared.id, PoolStatus::Shutdown);
            self.shared.wake_workers.notify_all();
        }
    }

    fn wait(&self) {
        if self.is_current() {
            warn!(pool = self.shared.id, "wait called from a worker of the same pool; ignored");
            return;
        }

        let mut state = self.shared.state.lock();
        if state.status != PoolStatus::Running {
            return;
        }

        state.transition(self.shared.id, PoolStatus::Waiting);
        self.shared.wake_workers.notify_all();

        while !(self.shared.queue.is_empty() && state.in_flight == 0) {
            self.shared.wake_host.wait(&mut state);
        }

        // A concurrent `stop` wins over the return to `Running`.
        if state.status == PoolStatus::Waiting {
            state.transition(self.shared.id, PoolStatus::Running);
        }
    }

    fn join(&self) {
        if self.is_current() {
            warn!(pool = self.shared.id, "join called from a worker of the same pool; ignored");
            return;
        }

        let mut handles = self.handles.lock();
        {
            let mut state = self.shared.state.lock();
            // Idle always has no workers left to join.
            if state.status == PoolStatus::Idle {
                return;
            }
            if state.status != PoolStatus::Shutdown {
                state.transition(self.shared.id, PoolStatus::Shutdown);
            }
            self.shared.wake_workers.notify_all();
        }

        debug!(pool = self.shared.id, workers = handles.len(), "joining workers");
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                warn!(pool = self.shared.id, "worker thread terminated abnormally");
            }
        }

        self.shared
            .state
            .lock()
            .transition(self.shared.id, PoolStatus::Idle);
    }

    fn status(&self) -> PoolStatus {
        self.shared.state.lock().status
    }

    fn is_current(&self) -> bool {
        current_worker().is_some_and(|worker| worker.pool == self.shared.id)
    }

    fn enqueue(&self, work: &WorkName, job: Job) -> Result<()> {
        let state = self.shared.state.lock();
        self.admit(&state)?;

        self.shared.queue.push(job);
        self.shared.wake_workers.notify_one();
        trace!(pool = self.shared.id, work = %work, "work item queued");
        Ok(())
    }

    fn bulk_enqueue(&self, work: &WorkName, f: BulkFn, shape: Shape) -> Result<()> {
        ExecError::check_shape(shape)?;
        let state = self.shared.state.lock();
        self.admit(&state)?;

        self.shared.queue.push_batch(shape.iter().map(|index| {
            let f = f.clone();
            Box::new(move || f(index)) as Job
        }));
        self.shared.wake_workers.notify_one();
        trace!(pool = self.shared.id, work = %work, %shape, "bulk work queued");
        Ok(())
    }
}

impl Drop for ThreadPoolBackend {
    fn drop(&mut self) {
        self.stop();

        // The last handle can be released by a work item; a worker cannot
        // join itself, so its siblings are left to exit on their own.
        if !self.is_current() {
            self.join();
        }
    }
}

impl fmt::Debug for ThreadPoolBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolBackend")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .field("workers", &self.config.worker_threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn anonymous() -> WorkName {
        WorkName::anonymous()
    }

    #[test]
    fn enqueue_before_start_is_rejected() {
        let pool = ThreadPoolBackend::new(2);

        let err = pool.enqueue(&anonymous(), Box::new(|| {})).unwrap_err();
        assert!(matches!(
            err,
            ExecError::NotRunning {
                status: PoolStatus::Idle,
                ..
            }
        ));
    }

    #[test]
    fn start_is_idempotent() {
        let pool = ThreadPoolBackend::new(3);
        pool.start().unwrap();
        pool.start().unwrap();

        assert_eq!(pool.status(), PoolStatus::Running);
        assert_eq!(pool.live_workers(), 3);

        pool.join();
        assert_eq!(pool.status(), PoolStatus::Idle);
        assert_eq!(pool.live_workers(), 0);
    }

    #[test]
    fn stop_requires_join_before_restart() {
        let pool = ThreadPoolBackend::new(2);
        pool.start().unwrap();
        pool.stop();
        assert_eq!(pool.status(), PoolStatus::Shutdown);

        pool.start().unwrap();
        assert_eq!(pool.status(), PoolStatus::Shutdown);

        pool.join();
        pool.start().unwrap();
        assert_eq!(pool.status(), PoolStatus::Running);
    }

    #[test]
    fn join_drains_queued_work() {
        let pool = ThreadPoolBackend::new(1);
        pool.start().unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        pool.enqueue(
            &anonymous(),
            Box::new(move || {
                thread::sleep(Duration::from_millis(20));
                flag.store(true, Ordering::SeqCst);
            }),
        )
        .unwrap();

        pool.join();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn wait_returns_to_running() {
        let pool = ThreadPoolBackend::new(2);
        pool.start().unwrap();

        pool.wait();
        assert_eq!(pool.status(), PoolStatus::Running);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn workers_know_their_pool() {
        let pool = Arc::new(ThreadPoolBackend::new(2));
        pool.start().unwrap();

        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        pool.enqueue(
            &anonymous(),
            Box::new(move || *slot.lock() = current_worker()),
        )
        .unwrap();
        pool.wait();

        let worker = (*seen.lock()).expect("job ran on a worker");
        assert_eq!(worker.pool, pool.id());
        assert!(worker.index < 2);
        assert!(!pool.is_current());
    }
}
