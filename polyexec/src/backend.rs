//! The contract between executors and execution engines.
//!
//! A [`Backend`] owns a set of execution resources and exposes a small
//! lifecycle (`start`, `stop`, `wait`, `join`) plus two submission
//! primitives, [`Backend::enqueue`] and [`Backend::bulk_enqueue`]. Every
//! richer operation (fire-and-forget with a blocking policy, futures,
//! bulk futures, lazy adapters) is derived from those primitives by the
//! provided methods, so a new engine only has to implement the queue.

use crate::accelerator::CompletionSignal;
use crate::error::{ExecError, Result};
use crate::executor::{Blocking, WorkName};
use crate::future::{FutureHandle, promise};
use crate::index::{Index, Shape};
use crate::pool::PoolStatus;
use crate::sender::{Handoff, Receiver};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A unit of fire-and-forget work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A kernel invoked once per coordinate of a [`Shape`].
pub type BulkFn = Arc<dyn Fn(Index) + Send + Sync + 'static>;

/// Kernel of a lazy bulk stage, borrowing the upstream value.
pub type LazyKernel<U> = Arc<dyn Fn(Index, &U) + Send + Sync + 'static>;

/// An execution engine.
///
/// Implementations must be safe to share between threads: executor handles
/// hold them behind an [`Arc`] and submit from any thread.
pub trait Backend: Send + Sync + 'static {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Acquires the execution resources. Idempotent while running.
    fn start(&self) -> Result<()>;

    /// Stops accepting new work. Queued work still drains.
    fn stop(&self);

    /// Blocks until every queued and running item has finished.
    fn wait(&self);

    /// Stops, drains and releases the execution resources.
    fn join(&self);

    fn status(&self) -> PoolStatus;

    /// Whether the calling thread belongs to this backend.
    fn is_current(&self) -> bool;

    /// Queues one item.
    fn enqueue(&self, work: &WorkName, job: Job) -> Result<()>;

    /// Queues `f(index)` for every coordinate of `shape`.
    fn bulk_enqueue(&self, work: &WorkName, f: BulkFn, shape: Shape) -> Result<()>;

    /// Delivers a task-graph signal on this backend's execution resources.
    fn hop(&self, work: &WorkName, job: Job) -> Result<()> {
        self.enqueue(work, job)
    }

    /// Runs `kernel` over `shape`, then `complete` once every coordinate
    /// has finished.
    ///
    /// `complete` runs on whichever thread finishes the last coordinate.
    /// An empty shape queues `complete` alone.
    fn launch(&self, work: &WorkName, kernel: BulkFn, shape: Shape, complete: Job) -> Result<()> {
        let len = ExecError::check_shape(shape)?;
        if len == 0 {
            return self.enqueue(work, complete);
        }

        let remaining = AtomicUsize::new(len);
        let complete = Mutex::new(Some(complete));

        self.bulk_enqueue(
            work,
            Arc::new(move |index| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| kernel(index)));

                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    if let Some(complete) = complete.lock().take() {
                        complete();
                    }
                }

                if let Err(payload) = outcome {
                    panic::resume_unwind(payload);
                }
            }),
            shape,
        )
    }

    /// Queues `f` and applies the blocking policy.
    fn execute<F>(&self, work: &WorkName, blocking: Blocking, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
        Self: Sized,
    {
        self.enqueue(work, Box::new(f))?;
        barrier(self, blocking);
        Ok(())
    }

    /// Queues `f(index)` for every coordinate and applies the blocking policy.
    fn bulk_execute<F>(&self, work: &WorkName, blocking: Blocking, f: F, shape: Shape) -> Result<()>
    where
        F: Fn(Index) + Send + Sync + 'static,
        Self: Sized,
    {
        self.bulk_enqueue(work, Arc::new(f), shape)?;
        barrier(self, blocking);
        Ok(())
    }

    /// Queues `f` and returns a future for its result.
    ///
    /// The future is returned right away; blocking happens in
    /// [`FutureHandle::get`]. A panic inside `f` resolves the future with
    /// [`ExecError::Panicked`].
    fn twoway_execute<T, F>(&self, work: &WorkName, f: F) -> Result<FutureHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        Self: Sized,
    {
        let (promise, future) = promise();

        self.enqueue(
            work,
            Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(f));
                promise.set_result(outcome.map_err(ExecError::from_panic));
            }),
        )?;

        Ok(future)
    }

    /// Runs `f(index)` for every coordinate and returns a future for all
    /// results, ordered by linear index.
    ///
    /// The first panic observed resolves the future with an error once the
    /// remaining coordinates have finished.
    fn bulk_twoway_execute<T, F>(&self, work: &WorkName, f: F, shape: Shape) -> Result<FutureHandle<Vec<T>>>
    where
        F: Fn(Index) -> T + Send + Sync + 'static,
        T: Send + 'static,
        Self: Sized,
    {
        let len = ExecError::check_shape(shape)?;
        let (promise, future) = promise();

        if len == 0 {
            self.bulk_enqueue(work, Arc::new(|_: Index| {}), shape)?;
            promise.set_value(Vec::new());
            return Ok(future);
        }

        let results: Arc<Mutex<Vec<Option<T>>>> =
            Arc::new(Mutex::new((0..len).map(|_| None).collect()));
        let failure: Arc<Mutex<Option<ExecError>>> = Arc::new(Mutex::new(None));

        let kernel: BulkFn = {
            let results = results.clone();
            let failure = failure.clone();

            Arc::new(move |index: Index| match panic::catch_unwind(AssertUnwindSafe(|| f(index))) {
                Ok(value) => results.lock()[index.linear()] = Some(value),
                Err(payload) => {
                    failure
                        .lock()
                        .get_or_insert_with(|| ExecError::from_panic(payload));
                }
            })
        };

        let complete: Job = Box::new(move || {
            let outcome = match failure.lock().take() {
                Some(err) => Err(err),
                None => Ok(mem::take(&mut *results.lock())
                    .into_iter()
                    .flatten()
                    .collect()),
            };
            promise.set_result(outcome);
        });

        self.launch(work, kernel, shape, complete)?;
        Ok(future)
    }

    /// Wraps `receiver` into a stage that runs `f(index, &value)` over
    /// `shape` on this backend once a value arrives, then forwards it.
    fn lazy_execute<U, F, R>(
        self: Arc<Self>,
        work: WorkName,
        f: F,
        receiver: R,
        shape: Shape,
    ) -> LazyReceiver<Self, U, R>
    where
        F: Fn(Index, &U) + Send + Sync + 'static,
        U: Send + Sync + 'static,
        R: Receiver<U>,
        Self: Sized,
    {
        LazyReceiver {
            backend: self,
            work,
            kernel: Arc::new(f),
            shape,
            receiver,
            signal: CompletionSignal::new(),
        }
    }
}

/// Blocks on the backend when the policy allows it.
///
/// Workers of the same backend never block on it: they are part of what
/// `wait` waits for.
fn barrier<B: Backend + ?Sized>(backend: &B, blocking: Blocking) {
    if blocking.may_block() && !backend.is_current() {
        backend.wait();
    }
}

/// Receiver produced by [`Backend::lazy_execute`].
///
/// Once the upstream value arrives it is parked in shared storage, the
/// kernel runs over the launch shape reading it, and afterwards the value
/// moves on to the wrapped receiver. The completion signal reflects the
/// outcome of the stage.
pub struct LazyReceiver<B: Backend, U, R> {
    backend: Arc<B>,
    work: WorkName,
    kernel: LazyKernel<U>,
    shape: Shape,
    receiver: R,
    signal: CompletionSignal,
}

impl<B: Backend, U, R> LazyReceiver<B, U, R> {
    /// Completion signal of this stage.
    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }
}

impl<B, U, R> Receiver<U> for LazyReceiver<B, U, R>
where
    B: Backend,
    U: Send + Sync + 'static,
    R: Receiver<U>,
{
    fn set_value(self, value: U) {
        let Self {
            backend,
            work,
            kernel,
            shape,
            receiver,
            signal,
        } = self;

        let param = Arc::new(RwLock::new(Some(value)));
        let failure: Arc<Mutex<Option<ExecError>>> = Arc::new(Mutex::new(None));

        let bulk: BulkFn = {
            let param = param.clone();
            let failure = failure.clone();

            Arc::new(move |index| {
                let guard = param.read();
                let Some(value) = guard.as_ref() else {
                    return;
                };

                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| kernel(index, value))) {
                    failure
                        .lock()
                        .get_or_insert_with(|| ExecError::from_panic(payload));
                }
            })
        };

        let handoff = Handoff::new(receiver);
        let complete: Job = {
            let handoff = handoff.clone();
            let signal = signal.clone();

            Box::new(move || {
                let Some(receiver) = handoff.take() else {
                    return;
                };

                if let Some(err) = failure.lock().take() {
                    signal.fail(err.code());
                    receiver.set_error(err);
                    return;
                }

                let value = param.write().take();
                match value {
                    Some(value) => {
                        signal.complete();
                        receiver.set_value(value);
                    }
                    None => {
                        signal.fail(ExecError::BrokenPromise.code());
                        receiver.set_error(ExecError::BrokenPromise);
                    }
                }
            })
        };

        trace!(backend = backend.name(), work = %work, %shape, "launching lazy stage");
        if let Err(err) = backend.launch(&work, bulk, shape, complete) {
            if let Some(receiver) = handoff.take() {
                signal.fail(err.code());
                receiver.set_error(err);
            }
        }
    }

    fn set_error(self, error: ExecError) {
        self.signal.fail(error.code());
        self.receiver.set_error(error);
    }

    fn set_done(self) {
        self.signal.cancel();
        self.receiver.set_done();
    }
}

impl<B: Backend, U, R> fmt::Debug for LazyReceiver<B, U, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReceiver")
            .field("backend", &self.backend.name())
            .field("work", &self.work)
            .field("shape", &self.shape)
            .field("signal", &self.signal.status())
            .finish()
    }
}
