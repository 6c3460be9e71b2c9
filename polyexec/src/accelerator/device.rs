use super::CompletionSignal;
use crate::backend::{Backend, BulkFn, Job};
use crate::error::{ExecError, Result};
use crate::executor::{CallShape, Executor, WorkName};
use crate::index::Shape;
use crate::pool::{PoolStatus, ThreadPoolBackend, ThreadPoolBuilder};

use tracing::trace;

use std::panic::{self, AssertUnwindSafe};

/// An in-order command queue standing in for an accelerator device.
///
/// Every submission becomes one command; commands run one after another
/// on a single dedicated thread, in submission order. A bulk submission is
/// a single command covering its whole index space, so a later command
/// observes every effect of an earlier launch.
#[derive(Debug)]
pub struct DeviceQueue {
    queue: ThreadPoolBackend,
}

impl DeviceQueue {
    pub fn new() -> Self {
        let queue = ThreadPoolBuilder::new()
            .worker_threads(1)
            .thread_name("polyexec-device")
            .build_backend();

        Self { queue }
    }

    /// Queues a marker that completes `signal` once every command submitted
    /// before it has finished.
    pub fn trigger_signal(&self, signal: &CompletionSignal) -> Result<()> {
        let signal = signal.clone();
        self.command(
            &WorkName::new("trigger-signal"),
            Box::new(move || {
                signal.complete();
            }),
        )
    }

    /// Queues one command, reporting rejections under the device's name.
    fn command(&self, work: &WorkName, job: Job) -> Result<()> {
        self.queue.enqueue(work, job).map_err(|err| match err {
            ExecError::NotRunning { status, .. } => ExecError::NotRunning {
                backend: self.name(),
                status,
            },
            err => err,
        })
    }

    /// Number of commands waiting to run.
    pub fn pending_commands(&self) -> usize {
        self.queue.queued()
    }
}

impl Default for DeviceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for DeviceQueue {
    fn name(&self) -> &'static str {
        "device-queue"
    }

    fn start(&self) -> Result<()> {
        self.queue.start()
    }

    fn stop(&self) {
        self.queue.stop();
    }

    fn wait(&self) {
        self.queue.wait();
    }

    fn join(&self) {
        self.queue.join();
    }

    fn status(&self) -> PoolStatus {
        self.queue.status()
    }

    fn is_current(&self) -> bool {
        self.queue.is_current()
    }

    fn enqueue(&self, work: &WorkName, job: Job) -> Result<()> {
        self.command(work, job)
    }

    fn bulk_enqueue(&self, work: &WorkName, f: BulkFn, shape: Shape) -> Result<()> {
        ExecError::check_shape(shape)?;
        trace!(work = %work, %shape, "device launch");
        self.command(
            work,
            Box::new(move || {
                for index in shape {
                    f(index);
                }
            }),
        )
    }

    /// Signals are delivered where they arrive: on the command thread.
    fn hop(&self, _work: &WorkName, job: Job) -> Result<()> {
        match self.status() {
            PoolStatus::Running | PoolStatus::Waiting => {
                job();
                Ok(())
            }
            status => Err(ExecError::NotRunning {
                backend: self.name(),
                status,
            }),
        }
    }

    fn launch(&self, work: &WorkName, kernel: BulkFn, shape: Shape, complete: Job) -> Result<()> {
        ExecError::check_shape(shape)?;
        trace!(work = %work, %shape, "device launch with completion");
        self.command(
            work,
            Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    for index in shape {
                        kernel(index);
                    }
                }));

                complete();

                if let Err(payload) = outcome {
                    panic::resume_unwind(payload);
                }
            }),
        )
    }
}

impl<S: CallShape> Executor<DeviceQueue, S> {
    /// See [`DeviceQueue::trigger_signal`].
    pub fn trigger_signal(&self, signal: &CompletionSignal) -> Result<()> {
        self.backend().trigger_signal(signal)
    }
}
