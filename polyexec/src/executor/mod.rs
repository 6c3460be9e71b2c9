//! Executor handles.
//!
//! An [`Executor`] is a cheap, clonable handle on a [`Backend`] plus three
//! pieces of configuration:
//! - a **call shape** (type parameter `S`) selecting which submission
//!   operations exist: `execute` only compiles on a [`OneWay`] handle,
//!   `twoway_execute` only on a [`TwoWay`] handle, and so on,
//! - a [`Blocking`] policy,
//! - a [`WorkName`] attached to every submission for logging.
//!
//! Handles are narrowed with [`Executor::require_concept`] (changes the call
//! shape) and [`Executor::require`] (changes one property). Narrowing never
//! touches the backend: every handle derived from a context submits to the
//! same engine.
//!
//! ```rust,ignore
//! let pool = StaticThreadPool::with_threads(4)?;
//!
//! let twoway = pool.executor().require_concept(TwoWay).require(Blocking::Never);
//! let answer = twoway.twoway_execute(|| 6 * 7)?.get()?;
//! ```

mod properties;
mod shape;

pub use properties::{Blocking, Property, WorkName};
pub use shape::{BulkOneWay, BulkTwoWay, CallShape, Lazy, OneWay, ShapeKind, TwoWay};

use crate::backend::{Backend, Job, LazyReceiver};
use crate::error::Result;
use crate::future::FutureHandle;
use crate::index::{Index, Shape};
use crate::sender::{Handoff, Receiver, Task, TaskKind};

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A handle submitting work to a backend with a given call shape.
pub struct Executor<B: Backend, S: CallShape = OneWay> {
    backend: Arc<B>,
    blocking: Blocking,
    work: WorkName,
    shape: PhantomData<fn() -> S>,
}

impl<B: Backend> Executor<B, OneWay> {
    /// Default handle on `backend`: oneway, `Blocking::Possibly`, anonymous.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            blocking: Blocking::default(),
            work: WorkName::anonymous(),
            shape: PhantomData,
        }
    }
}

impl<B: Backend, S: CallShape> Executor<B, S> {
    /// Returns a handle with the call shape `S2` and every other field
    /// unchanged.
    pub fn require_concept<S2: CallShape>(&self, _shape: S2) -> Executor<B, S2> {
        Executor {
            backend: self.backend.clone(),
            blocking: self.blocking,
            work: self.work.clone(),
            shape: PhantomData,
        }
    }

    /// Returns a handle with `property` replaced.
    pub fn require<P: Property>(&self, property: P) -> Self {
        property.apply(self.clone())
    }

    pub fn query_blocking(&self) -> Blocking {
        self.blocking
    }

    pub fn work_name(&self) -> &WorkName {
        &self.work
    }

    pub fn shape_kind(&self) -> ShapeKind {
        S::KIND
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The oneway handle handed to scheduled receivers.
    fn sub_executor(&self) -> Executor<B, OneWay> {
        self.require_concept(OneWay)
    }
}

impl<B: Backend> Executor<B, OneWay> {
    /// Submits `f` for execution.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.backend.execute(&self.work, self.blocking, f)
    }
}

impl<B: Backend> Executor<B, BulkOneWay> {
    /// Submits `f(index)` for every coordinate of `shape`.
    pub fn bulk_execute<F>(&self, f: F, shape: Shape) -> Result<()>
    where
        F: Fn(Index) + Send + Sync + 'static,
    {
        self.backend.bulk_execute(&self.work, self.blocking, f, shape)
    }
}

impl<B: Backend> Executor<B, TwoWay> {
    /// Submits `f` and returns a future for its result.
    pub fn twoway_execute<T, F>(&self, f: F) -> Result<FutureHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.backend.twoway_execute(&self.work, f)
    }
}

impl<B: Backend> Executor<B, BulkTwoWay> {
    /// Submits `f(index)` for every coordinate of `shape` and returns a
    /// future for the results in linear-index order.
    pub fn bulk_twoway_execute<T, F>(&self, f: F, shape: Shape) -> Result<FutureHandle<Vec<T>>>
    where
        F: Fn(Index) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.backend.bulk_twoway_execute(&self.work, f, shape)
    }
}

impl<B: Backend> Executor<B, Lazy> {
    /// Returns a task that, once submitted, delivers a oneway handle to its
    /// receiver from the backend's execution resources.
    ///
    /// If the backend refuses the work, the receiver gets the error instead.
    pub fn schedule(&self) -> Task<Executor<B, OneWay>> {
        let executor = self.clone();

        Task::new(TaskKind::Schedule(self.backend.name()), move |receiver| {
            let handoff = Handoff::new(receiver);
            let sub = executor.sub_executor();

            let delivery = handoff.clone();
            let submitted = executor
                .backend
                .execute(&executor.work, executor.blocking, move || {
                    if let Some(receiver) = delivery.take() {
                        receiver.set_value(sub);
                    }
                });

            if let Err(err) = submitted {
                if let Some(receiver) = handoff.take() {
                    receiver.set_error(err);
                }
            }
        })
    }

    /// Wraps `receiver` into the backend's lazy bulk stage.
    pub fn lazy_execute<U, F, R>(&self, f: F, receiver: R, shape: Shape) -> LazyReceiver<B, U, R>
    where
        F: Fn(Index, &U) + Send + Sync + 'static,
        U: Send + Sync + 'static,
        R: Receiver<U>,
    {
        self.backend
            .clone()
            .lazy_execute(self.work.clone(), f, receiver, shape)
    }
}

impl<B: Backend, S: CallShape> Clone for Executor<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            blocking: self.blocking,
            work: self.work.clone(),
            shape: PhantomData,
        }
    }
}

/// All handles of one backend type are interchangeable.
impl<B: Backend, S: CallShape, S2: CallShape> PartialEq<Executor<B, S2>> for Executor<B, S> {
    fn eq(&self, _other: &Executor<B, S2>) -> bool {
        true
    }
}

impl<B: Backend, S: CallShape> Eq for Executor<B, S> {}

impl<B: Backend, S: CallShape> fmt::Debug for Executor<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("backend", &self.backend.name())
            .field("shape", &S::KIND)
            .field("blocking", &self.blocking)
            .field("work", &self.work)
            .finish()
    }
}

/// Object-safe view of an executor used by `via` stages.
pub(crate) trait Hop: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn hop(&self, job: Job) -> Result<()>;
}

impl<B: Backend, S: CallShape> Hop for Executor<B, S> {
    fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn hop(&self, job: Job) -> Result<()> {
        self.backend.hop(&self.work, job)
    }
}
