//! Error types shared by the backends, the future/promise pair and the
//! task graph.
//!
//! Errors fall into three groups:
//! - **misuse**: submitting to a backend that is not running, or reading a
//!   promise that was abandoned,
//! - **task-graph errors**: anything raised while a task graph runs is
//!   turned into an error signal on the receiver,
//! - **work failures**: panics or explicit failures inside user code that
//!   travel through a future or a receiver.

use crate::index::Shape;
use crate::pool::PoolStatus;

use std::any::Any;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ExecError> = std::result::Result<T, E>;

/// Every failure reported by `polyexec`.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Work was submitted to a backend that does not accept it.
    #[error("failed to schedule work: {backend} is not running (status: {status})")]
    NotRunning {
        backend: &'static str,
        status: PoolStatus,
    },

    /// A worker thread could not be created.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),

    /// The promise was dropped before it was satisfied.
    #[error("promise dropped before a value or error was set")]
    BrokenPromise,

    #[error("promise already satisfied")]
    PromiseAlreadySatisfied,

    #[error("future already retrieved from this promise")]
    FutureAlreadyRetrieved,

    /// A bounded wait on a future expired.
    #[error("timed out after {0:?} waiting for a result")]
    Timeout(Duration),

    /// User code panicked; carries the panic message.
    #[error("work panicked: {0}")]
    Panicked(String),

    /// User code reported a failure.
    #[error("{0}")]
    Failed(String),

    /// An accelerator reported an error code.
    #[error("device reported error code {code}")]
    Device { code: i32 },

    /// A bulk iteration space has more points than fit in a `usize`.
    #[error("iteration space {0} is too large to submit")]
    ShapeOverflow(Shape),
}

impl ExecError {
    /// Stable numeric code, used as the payload of a failed completion
    /// signal.
    pub fn code(&self) -> i32 {
        match self {
            ExecError::NotRunning { .. } => -1,
            ExecError::Spawn(_) => -2,
            ExecError::BrokenPromise => -3,
            ExecError::PromiseAlreadySatisfied => -4,
            ExecError::FutureAlreadyRetrieved => -5,
            ExecError::Timeout(_) => -6,
            ExecError::Panicked(_) => -7,
            ExecError::Failed(_) => -8,
            ExecError::Device { code } => *code,
            ExecError::ShapeOverflow(_) => -9,
        }
    }

    /// Returns the number of points in `shape`, or
    /// [`ExecError::ShapeOverflow`] when it does not fit in a `usize`.
    pub(crate) fn check_shape(shape: Shape) -> Result<usize> {
        shape.checked_len().ok_or(ExecError::ShapeOverflow(shape))
    }

    /// Shorthand for [`ExecError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        ExecError::Failed(message.into())
    }

    /// Converts a caught panic payload into [`ExecError::Panicked`].
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        ExecError::Panicked(panic_message(payload.as_ref()))
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::panic;

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| -> i32 { panic!("boom") }).unwrap_err();
        let err = ExecError::from_panic(payload);
        assert!(matches!(err, ExecError::Panicked(ref msg) if msg == "boom"));

        let payload = panic::catch_unwind(|| -> i32 { panic!("{} {}", "formatted", 7) }).unwrap_err();
        let err = ExecError::from_panic(payload);
        assert!(matches!(err, ExecError::Panicked(ref msg) if msg == "formatted 7"));
    }

    #[test]
    fn device_codes_pass_through() {
        assert_eq!(ExecError::Device { code: 42 }.code(), 42);
        assert_eq!(ExecError::failed("nope").code(), -8);
        assert_eq!(ExecError::failed("nope").to_string(), "nope");
    }

    #[test]
    fn oversized_shapes_are_rejected() {
        let shape = Shape::new(usize::MAX, usize::MAX, 1);
        let err = ExecError::check_shape(shape).unwrap_err();

        assert!(matches!(err, ExecError::ShapeOverflow(s) if s == shape));
        assert_eq!(err.code(), -9);
        assert_eq!(ExecError::check_shape(Shape::new(3, 0, usize::MAX)).unwrap(), 0);
    }

    #[test]
    fn not_running_mentions_status() {
        let err = ExecError::NotRunning {
            backend: "thread-pool",
            status: PoolStatus::Idle,
        };
        assert_eq!(
            err.to_string(),
            "failed to schedule work: thread-pool is not running (status: idle)"
        );
    }
}
