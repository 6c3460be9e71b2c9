//! Accelerator-style execution.
//!
//! Accelerators run work from an in-order command queue and report
//! progress through completion signals rather than futures. This module
//! models that contract on the host:
//! - [`DeviceQueue`]: a backend whose commands run one at a time, in
//!   order, on a dedicated thread,
//! - [`CompletionSignal`]: a status word set once by the device,
//! - [`SignalReceiver`]: a terminal receiver reflecting a task's outcome
//!   on a signal.
//!
//! Lazy bulk stages on a device queue ([`bulk_transform`]) launch their
//! whole index space as one command and mark their signal when it ends.
//!
//! [`bulk_transform`]: crate::sender::bulk_transform

mod device;
mod signal;

pub use device::DeviceQueue;
pub use signal::{CompletionSignal, Outcome, SignalReader, SignalReceiver, SignalStatus};

use crate::context::ExecutionContext;
use crate::error::Result;

/// Execution context owning a [`DeviceQueue`].
pub type AcceleratorContext = ExecutionContext<DeviceQueue>;

impl ExecutionContext<DeviceQueue> {
    /// Starts a context on a fresh device queue.
    pub fn device() -> Result<Self> {
        Self::new(DeviceQueue::new())
    }
}
