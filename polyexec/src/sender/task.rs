use super::receiver::{BoxReceiver, Handoff, Receiver, Signal, receiver_fn};
use crate::backend::Backend;
use crate::error::{ExecError, Result};
use crate::executor::{CallShape, Executor, Hop, Lazy};
use crate::index::{Index, Shape};

use tracing::trace;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Stage of a task chain, as reported by [`Task::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Immediate signal.
    Just,
    /// Hands an executor to the receiver from the named backend.
    Schedule(&'static str),
    /// Re-delivers the upstream signal through the named backend.
    Via(&'static str),
    Transform,
    /// Runs a kernel over an index space on the named backend.
    BulkTransform(&'static str),
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Just => f.write_str("Just"),
            TaskKind::Schedule(backend) => write!(f, "Schedule({backend})"),
            TaskKind::Via(backend) => write!(f, "Via({backend})"),
            TaskKind::Transform => f.write_str("Transform"),
            TaskKind::BulkTransform(backend) => write!(f, "BulkTransform({backend})"),
        }
    }
}

type Start<T> = Box<dyn FnOnce(BoxReceiver<T>) + Send + 'static>;

/// A lazy description of asynchronous work producing one signal of type
/// `T`.
///
/// Nothing runs until the task is submitted to a receiver. Combinators
/// consume the upstream task and return a new one, so a chain is built
/// inside out and runs from its innermost stage.
#[must_use = "tasks do nothing unless submitted"]
pub struct Task<T> {
    start: Start<T>,

    /// Stage kinds, outermost first.
    chain: Vec<TaskKind>,
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new<F>(kind: TaskKind, start: F) -> Self
    where
        F: FnOnce(BoxReceiver<T>) + Send + 'static,
    {
        Self {
            start: Box::new(start),
            chain: vec![kind],
        }
    }

    /// Builds a stage on top of `self`. `start` receives the upstream task
    /// and the downstream receiver.
    fn then<U, F>(self, kind: TaskKind, start: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(Task<T>, BoxReceiver<U>) + Send + 'static,
    {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.push(kind);
        chain.extend_from_slice(&self.chain);

        Task {
            start: Box::new(move |receiver| start(self, receiver)),
            chain,
        }
    }

    /// Kind of the outermost stage.
    pub fn kind(&self) -> TaskKind {
        self.chain[0]
    }

    /// Kinds of every stage, outermost first.
    pub fn chain(&self) -> &[TaskKind] {
        &self.chain
    }

    /// Starts the task; its terminal signal goes to `receiver`.
    pub fn submit<R: Receiver<T>>(self, receiver: R) {
        trace!(task = ?self, "submitting task");
        (self.start)(BoxReceiver::new(receiver));
    }

    /// Re-delivers this task's signal on `executor`'s backend.
    ///
    /// If the backend refuses the hop, the receiver gets the refusal on the
    /// current thread.
    pub fn via<B: Backend, S: CallShape>(self, executor: &Executor<B, S>) -> Task<T> {
        let hop: Box<dyn Hop> = Box::new(executor.clone());

        self.then(TaskKind::Via(hop.backend_name()), move |upstream, receiver| {
            upstream.submit(receiver_fn(move |signal: Signal<T>| {
                let handoff = Handoff::new((receiver, signal));

                let delivery = handoff.clone();
                let hopped = hop.hop(Box::new(move || {
                    if let Some((receiver, signal)) = delivery.take() {
                        signal.deliver(receiver);
                    }
                }));

                if let Err(err) = hopped {
                    if let Some((receiver, _)) = handoff.take() {
                        receiver.set_error(err);
                    }
                }
            }));
        })
    }

    /// Maps the upstream value with `f`. Errors and done pass through.
    ///
    /// A panic in `f` arrives on the error channel as
    /// [`ExecError::Panicked`].
    pub fn transform<U, F>(self, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.try_transform(move |value| Ok(f(value)))
    }

    /// Like [`transform`](Self::transform), but an `Err` from `f` goes to
    /// the error channel.
    pub fn try_transform<U, F>(self, f: F) -> Task<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        self.then(TaskKind::Transform, move |upstream, receiver| {
            upstream.submit(receiver_fn(move |signal: Signal<T>| match signal {
                Signal::Value(value) => {
                    match panic::catch_unwind(AssertUnwindSafe(move || f(value))) {
                        Ok(Ok(mapped)) => receiver.set_value(mapped),
                        Ok(Err(err)) => receiver.set_error(err),
                        Err(payload) => receiver.set_error(ExecError::from_panic(payload)),
                    }
                }
                Signal::Error(err) => receiver.set_error(err),
                Signal::Done => receiver.set_done(),
            }));
        })
    }

    /// Runs `f(index, &value)` over `shape` on `executor`'s backend once
    /// the upstream value arrives, then forwards the value.
    pub fn bulk_transform<B, F>(self, executor: &Executor<B, Lazy>, f: F, shape: Shape) -> Task<T>
    where
        T: Sync,
        B: Backend,
        F: Fn(Index, &T) + Send + Sync + 'static,
    {
        let executor = executor.clone();

        self.then(
            TaskKind::BulkTransform(executor.backend().name()),
            move |upstream, receiver| upstream.submit(executor.lazy_execute(f, receiver, shape)),
        )
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, kind) in self.chain.iter().enumerate() {
            if position > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::{just, just_done, sync_wait};

    #[test]
    fn chain_is_reported_outermost_first() {
        let task = just(2).transform(|v| v + 1).transform(|v| v * 10);

        assert_eq!(task.kind(), TaskKind::Transform);
        assert_eq!(
            task.chain(),
            [TaskKind::Transform, TaskKind::Transform, TaskKind::Just]
        );
        assert_eq!(format!("{task:?}"), "Transform <- Transform <- Just");
    }

    #[test]
    fn transforms_apply_in_order() {
        let task = just(2).transform(|v| v + 1).transform(|v| v * 10);

        assert_eq!(sync_wait(task).unwrap(), Some(30));
    }

    #[test]
    fn failing_transform_short_circuits() {
        let task = just("12x")
            .try_transform(|s| s.parse::<u32>().map_err(|e| ExecError::failed(e.to_string())))
            .transform(|n| n + 1);

        assert!(matches!(sync_wait(task), Err(ExecError::Failed(_))));
    }

    #[test]
    fn done_skips_transforms() {
        let task = just_done::<u8>().transform(|v| v + 1);

        assert_eq!(sync_wait(task).unwrap(), None);
    }
}
