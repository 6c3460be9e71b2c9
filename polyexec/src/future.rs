//! Single-value promise/future pair.
//!
//! A [`Promise`] is owned by the producer and a [`FutureHandle`] by the
//! consumer; both share a reference-counted state block holding at most
//! one of {value, error}. The state is written once and is immutable
//! afterwards.
//!
//! This is a one-shot synchronization point, not a composable abstraction:
//! there is no `then`, no cancellation. Composition is the job of the task
//! graph in [`crate::sender`].

use crate::error::{ExecError, Result};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Contents of the shared state block.
enum Slot<T> {
    Empty,
    Value(T),
    Error(ExecError),
    Taken,
}

impl<T> Slot<T> {
    fn is_set(&self) -> bool {
        !matches!(self, Slot::Empty)
    }
}

/// State shared between a promise and its future.
struct SharedState<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> SharedState<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            ready: Condvar::new(),
        }
    }

    /// Stores the outcome. The first write wins; later writes are rejected.
    fn set(&self, outcome: Result<T>) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.is_set() {
            return Err(ExecError::PromiseAlreadySatisfied);
        }

        *slot = match outcome {
            Ok(value) => Slot::Value(value),
            Err(err) => Slot::Error(err),
        };
        drop(slot);

        self.ready.notify_all();
        Ok(())
    }

    fn is_set(&self) -> bool {
        self.slot.lock().is_set()
    }

    fn wait(&self) {
        let mut slot = self.slot.lock();
        while !slot.is_set() {
            self.ready.wait(&mut slot);
        }
    }

    fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = self.slot.lock();
        while !slot.is_set() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.is_set();
            }
        }
        true
    }

    fn take(&self) -> Result<T> {
        match mem::replace(&mut *self.slot.lock(), Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Error(err) => Err(err),
            Slot::Empty | Slot::Taken => Err(ExecError::BrokenPromise),
        }
    }
}

/// Producer side of a one-shot result channel.
///
/// Setting a value or an error consumes the promise, so it can be satisfied
/// at most once. Dropping an unsatisfied promise stores
/// [`ExecError::BrokenPromise`] so the consumer never blocks forever.
pub struct Promise<T> {
    state: Arc<SharedState<T>>,
    future_retrieved: bool,
    satisfied: bool,
}

impl<T> Promise<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState::new()),
            future_retrieved: false,
            satisfied: false,
        }
    }

    /// Returns the future tied to this promise.
    ///
    /// A promise hands out exactly one future; later calls fail with
    /// [`ExecError::FutureAlreadyRetrieved`].
    pub fn future(&mut self) -> Result<FutureHandle<T>> {
        if self.future_retrieved {
            return Err(ExecError::FutureAlreadyRetrieved);
        }

        self.future_retrieved = true;
        Ok(FutureHandle {
            state: self.state.clone(),
        })
    }

    /// Satisfies the promise with a value.
    pub fn set_value(mut self, value: T) {
        self.finish(Ok(value));
    }

    /// Satisfies the promise with an error.
    pub fn set_error(mut self, error: ExecError) {
        self.finish(Err(error));
    }

    /// Satisfies the promise with either outcome.
    pub fn set_result(mut self, outcome: Result<T>) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Result<T>) {
        self.satisfied = true;
        if let Err(err) = self.state.set(outcome) {
            warn!(error = %err, "promise written twice; keeping the first outcome");
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.satisfied {
            let _ = self.state.set(Err(ExecError::BrokenPromise));
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("satisfied", &self.satisfied)
            .finish()
    }
}

/// Consumer side of a one-shot result channel.
///
/// Returned by twoway submission. [`get`](Self::get) blocks on a condition
/// variable until the producer has stored a value or an error.
pub struct FutureHandle<T> {
    state: Arc<SharedState<T>>,
}

impl<T> FutureHandle<T> {
    /// Returns `true` once a value or an error has been stored.
    pub fn is_ready(&self) -> bool {
        self.state.is_set()
    }

    /// Blocks until the result is available, without consuming it.
    pub fn wait(&self) {
        self.state.wait();
    }

    /// Blocks for at most `timeout`; returns whether the result is available.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.state.wait_until(Instant::now() + timeout)
    }

    /// Blocks until the result is available and returns it.
    pub fn get(self) -> Result<T> {
        self.state.wait();
        self.state.take()
    }

    /// Like [`get`](Self::get) but gives up with [`ExecError::Timeout`]
    /// after `timeout`.
    pub fn get_timeout(self, timeout: Duration) -> Result<T> {
        if !self.wait_timeout(timeout) {
            return Err(ExecError::Timeout(timeout));
        }
        self.state.take()
    }
}

impl<T> fmt::Debug for FutureHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Creates a connected promise/future pair.
pub fn promise<T>() -> (Promise<T>, FutureHandle<T>) {
    let state = Arc::new(SharedState::new());
    let future = FutureHandle {
        state: state.clone(),
    };
    let promise = Promise {
        state,
        future_retrieved: true,
        satisfied: false,
    };
    (promise, future)
}
