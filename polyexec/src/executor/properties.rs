use super::{CallShape, Executor};
use crate::backend::Backend;

use std::fmt;
use std::sync::Arc;

mod sealed {
    pub trait Sealed {}
}

/// A configurable aspect of an executor handle, applied with
/// [`Executor::require`].
pub trait Property: sealed::Sealed {
    /// Returns `executor` with this property replaced.
    fn apply<B: Backend, S: CallShape>(self, executor: Executor<B, S>) -> Executor<B, S>;
}

/// Whether submission may block the caller until the backend drains.
///
/// The policy is advisory: backends decide what blocking means. The worker
/// pool waits for quiescence after submitting under `Always` and
/// `Possibly`, unless the caller is one of its own workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Blocking {
    Always,
    Never,
    #[default]
    Possibly,
}

impl Blocking {
    /// Whether a submission under this policy may wait for the backend.
    pub fn may_block(self) -> bool {
        !matches!(self, Blocking::Never)
    }
}

impl sealed::Sealed for Blocking {}

impl Property for Blocking {
    fn apply<B: Backend, S: CallShape>(self, mut executor: Executor<B, S>) -> Executor<B, S> {
        executor.blocking = self;
        executor
    }
}

/// Optional label attached to submitted work, used in logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WorkName(Option<Arc<str>>);

impl WorkName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(Some(name.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for WorkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("<anonymous>"))
    }
}

impl From<&str> for WorkName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl sealed::Sealed for WorkName {}

impl Property for WorkName {
    fn apply<B: Backend, S: CallShape>(self, mut executor: Executor<B, S>) -> Executor<B, S> {
        executor.work = self;
        executor
    }
}
