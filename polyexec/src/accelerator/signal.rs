use crate::error::ExecError;
use crate::sender::Receiver;

use parking_lot::{Condvar, Mutex};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Observable state of a [`CompletionSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalStatus {
    Pending,
    Complete,
    /// The stage finished with done; no value was produced.
    Cancelled,
    /// The stage failed with the given error code.
    Failed(i32),
}

impl SignalStatus {
    pub fn is_pending(self) -> bool {
        self == SignalStatus::Pending
    }
}

struct Inner {
    status: Mutex<SignalStatus>,
    changed: Condvar,
}

/// A shared status word that a device stage sets once.
///
/// Clones observe the same signal. The first transition away from
/// [`SignalStatus::Pending`] wins; later ones are ignored.
#[derive(Clone)]
pub struct CompletionSignal {
    inner: Arc<Inner>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                status: Mutex::new(SignalStatus::Pending),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn complete(&self) -> bool {
        self.set(SignalStatus::Complete)
    }

    pub fn cancel(&self) -> bool {
        self.set(SignalStatus::Cancelled)
    }

    pub fn fail(&self, code: i32) -> bool {
        self.set(SignalStatus::Failed(code))
    }

    /// Returns `false` when the signal was already set.
    fn set(&self, next: SignalStatus) -> bool {
        let mut status = self.inner.status.lock();
        if !status.is_pending() {
            return false;
        }

        *status = next;
        drop(status);

        self.inner.changed.notify_all();
        true
    }

    pub fn status(&self) -> SignalStatus {
        *self.inner.status.lock()
    }

    pub fn is_set(&self) -> bool {
        !self.status().is_pending()
    }

    /// Blocks until the signal is set and returns its status.
    pub fn wait(&self) -> SignalStatus {
        let mut status = self.inner.status.lock();
        while status.is_pending() {
            self.inner.changed.wait(&mut status);
        }
        *status
    }

    /// Blocks for at most `timeout`; returns the status at that point.
    pub fn wait_timeout(&self, timeout: Duration) -> SignalStatus {
        let deadline = Instant::now() + timeout;
        let mut status = self.inner.status.lock();

        while status.is_pending() {
            if self.inner.changed.wait_until(&mut status, deadline).timed_out() {
                break;
            }
        }
        *status
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompletionSignal")
            .field(&self.status())
            .finish()
    }
}

/// What a [`SignalReceiver`] was given.
#[derive(Debug)]
pub enum Outcome<T> {
    Value(T),
    Error(ExecError),
    Done,
}

/// Terminal receiver that records the outcome of a task and reflects it
/// on a [`CompletionSignal`].
pub struct SignalReceiver<T> {
    signal: CompletionSignal,
    outcome: Arc<Mutex<Option<Outcome<T>>>>,
}

impl<T> SignalReceiver<T> {
    /// Creates a receiver and the handle to read its outcome.
    pub fn new(signal: CompletionSignal) -> (Self, SignalReader<T>) {
        let outcome = Arc::new(Mutex::new(None));
        let reader = SignalReader {
            signal: signal.clone(),
            outcome: outcome.clone(),
        };
        (Self { signal, outcome }, reader)
    }

    fn record(self, outcome: Outcome<T>, status: SignalStatus) {
        *self.outcome.lock() = Some(outcome);
        self.signal.set(status);
    }
}

impl<T: Send + 'static> Receiver<T> for SignalReceiver<T> {
    fn set_value(self, value: T) {
        self.record(Outcome::Value(value), SignalStatus::Complete);
    }

    fn set_error(self, error: ExecError) {
        let code = error.code();
        self.record(Outcome::Error(error), SignalStatus::Failed(code));
    }

    fn set_done(self) {
        self.record(Outcome::Done, SignalStatus::Cancelled);
    }
}

/// Reading side of a [`SignalReceiver`].
pub struct SignalReader<T> {
    signal: CompletionSignal,
    outcome: Arc<Mutex<Option<Outcome<T>>>>,
}

impl<T> SignalReader<T> {
    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    /// Waits for the signal, then takes the recorded outcome.
    ///
    /// Returns `None` if the signal was set by someone other than the
    /// receiver, or if the outcome was already taken.
    pub fn wait(&self) -> Option<Outcome<T>> {
        self.signal.wait();
        self.outcome.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    #[test]
    fn first_transition_wins() {
        let signal = CompletionSignal::new();

        assert!(signal.fail(-2));
        assert!(!signal.complete());
        assert_eq!(signal.status(), SignalStatus::Failed(-2));
    }

    #[test]
    fn clones_share_state() {
        let signal = CompletionSignal::new();
        let remote = signal.clone();

        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.complete();
        });

        assert_eq!(signal.wait(), SignalStatus::Complete);
        setter.join().unwrap();
    }

    #[test]
    fn bounded_wait_reports_pending() {
        let signal = CompletionSignal::new();

        assert_eq!(signal.wait_timeout(Duration::from_millis(5)), SignalStatus::Pending);
        assert!(!signal.is_set());
    }

    #[test]
    fn receiver_maps_error_codes() {
        let (receiver, reader) = SignalReceiver::<u8>::new(CompletionSignal::new());
        receiver.set_error(ExecError::Device { code: 12 });

        assert_eq!(reader.signal().status(), SignalStatus::Failed(12));
        assert!(matches!(reader.wait(), Some(Outcome::Error(ExecError::Device { code: 12 }))));
    }
}
