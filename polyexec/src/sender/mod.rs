//! Lazy task graphs.
//!
//! A [`Task`] describes work that produces exactly one terminal signal
//! (a value, an error, or done) and delivers it to a [`Receiver`]. Tasks
//! are inert until [`submit`]ted; combinators wrap the receiver of their
//! upstream so every stage runs when the signal reaches it.
//!
//! ```rust,ignore
//! let pool = StaticThreadPool::with_threads(2)?;
//! let executor = pool.executor();
//!
//! let task = via(&executor, just(21)).transform(|v| v * 2);
//! assert_eq!(sync_wait(task)?, Some(42));
//! ```
//!
//! Note that [`sync_wait`] blocks the calling thread. Calling it from a
//! worker of a pool the task hops to can deadlock when every worker is
//! blocked the same way.

mod receiver;
mod task;

pub use receiver::{BoxReceiver, FnReceiver, Receiver, Signal, receiver_fn};
pub use task::{Task, TaskKind};

pub(crate) use receiver::Handoff;

use crate::backend::Backend;
use crate::error::{ExecError, Result};
use crate::executor::{CallShape, Executor, Lazy};
use crate::future::{Promise, promise};
use crate::index::{Index, Shape};

/// A task that immediately delivers `value`.
pub fn just<T: Send + 'static>(value: T) -> Task<T> {
    just_signal(Signal::Value(value))
}

/// A task that immediately delivers `error`.
pub fn just_error<T: Send + 'static>(error: ExecError) -> Task<T> {
    just_signal(Signal::Error(error))
}

/// A task that immediately finishes without a value.
pub fn just_done<T: Send + 'static>() -> Task<T> {
    just_signal(Signal::Done)
}

fn just_signal<T: Send + 'static>(signal: Signal<T>) -> Task<T> {
    Task::new(TaskKind::Just, move |receiver| signal.deliver(receiver))
}

/// Re-delivers the signal of `task` through `executor`'s backend.
pub fn via<T, B, S>(executor: &Executor<B, S>, task: Task<T>) -> Task<T>
where
    T: Send + 'static,
    B: Backend,
    S: CallShape,
{
    task.via(executor)
}

/// Maps the value of `task` with `f`.
pub fn transform<T, U, F>(task: Task<T>, f: F) -> Task<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> U + Send + 'static,
{
    task.transform(f)
}

/// Maps the value of `task` with a fallible `f`.
pub fn try_transform<T, U, F>(task: Task<T>, f: F) -> Task<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> Result<U> + Send + 'static,
{
    task.try_transform(f)
}

/// Runs `f(index, &value)` over `shape` on `executor`'s backend, then
/// forwards the value of `task`.
pub fn bulk_transform<T, B, F>(
    executor: &Executor<B, Lazy>,
    task: Task<T>,
    f: F,
    shape: Shape,
) -> Task<T>
where
    T: Send + Sync + 'static,
    B: Backend,
    F: Fn(Index, &T) + Send + Sync + 'static,
{
    task.bulk_transform(executor, f, shape)
}

/// Starts `task`, delivering its signal to `receiver`.
pub fn submit<T, R>(task: Task<T>, receiver: R)
where
    T: Send + 'static,
    R: Receiver<T>,
{
    task.submit(receiver);
}

/// Submits `task` and blocks until it finishes.
///
/// A value is returned as `Ok(Some(value))`, done as `Ok(None)`, and an
/// error as `Err`.
pub fn sync_wait<T: Send + 'static>(task: Task<T>) -> Result<Option<T>> {
    let (promise, future) = promise();
    task.submit(WaitReceiver(promise));
    future.get()
}

struct WaitReceiver<T>(Promise<Option<T>>);

impl<T: Send + 'static> Receiver<T> for WaitReceiver<T> {
    fn set_value(self, value: T) {
        self.0.set_value(Some(value));
    }

    fn set_error(self, error: ExecError) {
        self.0.set_error(error);
    }

    fn set_done(self) {
        self.0.set_value(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn just_variants() {
        assert_eq!(sync_wait(just(7)).unwrap(), Some(7));
        assert_eq!(sync_wait(just_done::<i32>()).unwrap(), None);
        assert!(matches!(
            sync_wait(just_error::<i32>(ExecError::Device { code: 3 })),
            Err(ExecError::Device { code: 3 })
        ));
    }

    #[test]
    fn transform_panic_becomes_error() {
        let task = transform(just(1), |_: i32| -> i32 { panic!("mapping failed") });

        assert!(matches!(
            sync_wait(task),
            Err(ExecError::Panicked(msg)) if msg == "mapping failed"
        ));
    }
}
