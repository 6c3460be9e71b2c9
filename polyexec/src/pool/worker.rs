use super::Shared;
use crate::backend::Job;
use crate::error::panic_message;

use tracing::{debug, error, trace};

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;

thread_local! {
    /// Identity of the pool worker running on this thread, if any.
    ///
    /// Set for the whole lifetime of a worker thread. Backends use it to
    /// detect calls that would block a worker on its own pool.
    static CURRENT_WORKER: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Identifies a worker thread of a specific pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId {
    /// Process-unique identifier of the owning pool.
    pub pool: usize,

    /// Position of the worker within its pool.
    pub index: usize,
}

/// Returns the pool worker running on the calling thread, or `None` when
/// called from a thread no pool owns.
pub fn current_worker() -> Option<WorkerId> {
    CURRENT_WORKER.with(Cell::get)
}

/// Body of a worker thread.
///
/// The worker repeatedly claims one item from the shared queue and runs it
/// outside of the state lock. It parks on the worker condition variable
/// whenever there is nothing to claim, and exits once the queue is empty
/// and the pool releases its workers.
pub(crate) fn run(shared: Arc<Shared>, index: usize) {
    let id = WorkerId {
        pool: shared.id,
        index,
    };
    CURRENT_WORKER.with(|cell| cell.set(Some(id)));
    debug!(pool = id.pool, worker = index, "worker started");

    while let Some(job) = claim(&shared, id) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            shared.panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                pool = id.pool,
                worker = index,
                panic = %panic_message(payload.as_ref()),
                "work item panicked"
            );
        }
        release(&shared);
    }

    CURRENT_WORKER.with(|cell| cell.set(None));
    debug!(pool = id.pool, worker = index, "worker exited");
}

/// Parks until an item can be claimed, or returns `None` when the worker
/// should exit.
fn claim(shared: &Shared, id: WorkerId) -> Option<Job> {
    let mut state = shared.state.lock();

    loop {
        if state.status.drains_queue() {
            if let Some(job) = shared.queue.try_pop() {
                state.in_flight += 1;

                // A batch is announced with a single wake-up; pass it on.
                if !shared.queue.is_empty() {
                    shared.wake_workers.notify_one();
                }

                trace!(pool = id.pool, worker = id.index, "claimed work item");
                return Some(job);
            }

            if state.in_flight == 0 {
                shared.wake_host.notify_all();
            }

            if state.status.releases_workers() {
                return None;
            }
        }

        shared.wake_workers.wait(&mut state);
        trace!(pool = id.pool, worker = id.index, status = %state.status, "woke up");
    }
}

/// Marks the claimed item as finished and signals quiescence.
fn release(shared: &Shared) {
    let mut state = shared.state.lock();
    state.in_flight -= 1;

    if state.in_flight == 0 && shared.queue.is_empty() {
        shared.wake_host.notify_all();
    }
}
