use crate::error::ExecError;

use parking_lot::Mutex;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Consumer of the terminal signal of a task.
///
/// Exactly one of the three methods is called, exactly once; each consumes
/// the receiver.
pub trait Receiver<T>: Send + 'static {
    fn set_value(self, value: T);

    fn set_error(self, error: ExecError);

    /// The task finished without a value and without an error.
    fn set_done(self);
}

/// One terminal signal.
#[derive(Debug)]
pub enum Signal<T> {
    Value(T),
    Error(ExecError),
    Done,
}

impl<T> Signal<T> {
    /// Hands the signal to `receiver`.
    pub fn deliver<R: Receiver<T>>(self, receiver: R) {
        match self {
            Signal::Value(value) => receiver.set_value(value),
            Signal::Error(error) => receiver.set_error(error),
            Signal::Done => receiver.set_done(),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Signal::Value(_))
    }
}

trait ErasedReceiver<T>: Send {
    fn set_value_boxed(self: Box<Self>, value: T);
    fn set_error_boxed(self: Box<Self>, error: ExecError);
    fn set_done_boxed(self: Box<Self>);
}

impl<T, R: Receiver<T>> ErasedReceiver<T> for R {
    fn set_value_boxed(self: Box<Self>, value: T) {
        (*self).set_value(value);
    }

    fn set_error_boxed(self: Box<Self>, error: ExecError) {
        (*self).set_error(error);
    }

    fn set_done_boxed(self: Box<Self>) {
        (*self).set_done();
    }
}

/// A type-erased receiver.
pub struct BoxReceiver<T> {
    inner: Box<dyn ErasedReceiver<T>>,
}

impl<T: 'static> BoxReceiver<T> {
    pub fn new<R: Receiver<T>>(receiver: R) -> Self {
        Self {
            inner: Box::new(receiver),
        }
    }
}

impl<T: 'static> Receiver<T> for BoxReceiver<T> {
    fn set_value(self, value: T) {
        self.inner.set_value_boxed(value);
    }

    fn set_error(self, error: ExecError) {
        self.inner.set_error_boxed(error);
    }

    fn set_done(self) {
        self.inner.set_done_boxed();
    }
}

impl<T> fmt::Debug for BoxReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxReceiver")
    }
}

/// Receiver built from a closure, see [`receiver_fn`].
pub struct FnReceiver<T, F> {
    f: F,
    signal: PhantomData<fn(T)>,
}

impl<T, F> Receiver<T> for FnReceiver<T, F>
where
    T: 'static,
    F: FnOnce(Signal<T>) + Send + 'static,
{
    fn set_value(self, value: T) {
        (self.f)(Signal::Value(value));
    }

    fn set_error(self, error: ExecError) {
        (self.f)(Signal::Error(error));
    }

    fn set_done(self) {
        (self.f)(Signal::Done);
    }
}

/// Builds a receiver that passes whichever signal arrives to `f`.
///
/// ```rust,ignore
/// just(5).submit(receiver_fn(|signal| match signal {
///     Signal::Value(v) => println!("got {v}"),
///     Signal::Error(e) => eprintln!("failed: {e}"),
///     Signal::Done => {}
/// }));
/// ```
pub fn receiver_fn<T, F>(f: F) -> FnReceiver<T, F>
where
    T: 'static,
    F: FnOnce(Signal<T>) + Send + 'static,
{
    FnReceiver {
        f,
        signal: PhantomData,
    }
}

/// Shared slot that lets exactly one of two paths consume a value.
///
/// Used when a receiver is moved into submitted work but must be recovered
/// if the submission is refused.
pub(crate) struct Handoff<R>(Arc<Mutex<Option<R>>>);

impl<R> Handoff<R> {
    pub(crate) fn new(value: R) -> Self {
        Self(Arc::new(Mutex::new(Some(value))))
    }

    pub(crate) fn take(&self) -> Option<R> {
        self.0.lock().take()
    }
}

impl<R> Clone for Handoff<R> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc;

    #[test]
    fn boxed_receiver_forwards_each_signal() {
        let (tx, rx) = mpsc::channel();

        for signal in [Signal::Value(3), Signal::Error(ExecError::failed("x")), Signal::Done] {
            let tx = tx.clone();
            let receiver = BoxReceiver::new(receiver_fn(move |signal: Signal<i32>| {
                let label = match signal {
                    Signal::Value(v) => format!("value {v}"),
                    Signal::Error(e) => format!("error {e}"),
                    Signal::Done => "done".to_owned(),
                };
                tx.send(label).unwrap();
            }));
            signal.deliver(receiver);
        }

        let labels: Vec<String> = rx.try_iter().collect();
        assert_eq!(labels, ["value 3", "error x", "done"]);
    }

    #[test]
    fn handoff_yields_once() {
        let first = Handoff::new("receiver");
        let second = first.clone();

        assert_eq!(second.take(), Some("receiver"));
        assert_eq!(first.take(), None);
    }
}
