use crate::backend::Backend;
use crate::error::Result;
use crate::executor::Executor;
use crate::pool::{ThreadPoolBackend, ThreadPoolBuilder};

use tracing::debug;

use std::fmt;
use std::sync::Arc;

/// Owner of a started backend.
///
/// The context starts the backend when created and tears it down when
/// dropped: it stops accepting work, drains what is queued and joins the
/// execution resources. Executor handles obtained from it keep the backend
/// alive but not running.
///
/// # Examples
///
/// ```rust,ignore
/// let pool = StaticThreadPool::with_threads(4)?;
/// pool.executor().execute(|| println!("hello"))?;
/// pool.wait();
/// ```
pub struct ExecutionContext<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> ExecutionContext<B> {
    /// Starts `backend` and takes ownership of it.
    pub fn new(backend: B) -> Result<Self> {
        backend.start()?;
        debug!(backend = backend.name(), "execution context started");

        Ok(Self {
            backend: Arc::new(backend),
        })
    }

    /// Default handle: oneway, `Blocking::Possibly`, anonymous work.
    pub fn executor(&self) -> Executor<B> {
        Executor::new(self.backend.clone())
    }

    /// Blocks until every submitted item has finished.
    pub fn wait(&self) {
        self.backend.wait();
    }

    /// Stops accepting new work.
    pub fn stop(&self) {
        self.backend.stop();
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: Backend> Drop for ExecutionContext<B> {
    fn drop(&mut self) {
        debug!(backend = self.backend.name(), "shutting down execution context");

        self.backend.stop();
        self.backend.wait();
        self.backend.join();
    }
}

impl<B: Backend + fmt::Debug> fmt::Debug for ExecutionContext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("backend", &self.backend)
            .finish()
    }
}

/// Execution context owning a worker pool.
pub type StaticThreadPool = ExecutionContext<ThreadPoolBackend>;

impl ExecutionContext<ThreadPoolBackend> {
    /// Starts a pool of `n` workers with default settings otherwise.
    pub fn with_threads(n: usize) -> Result<Self> {
        ThreadPoolBuilder::new().worker_threads(n).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolStatus;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn context_starts_and_tears_down() {
        let pool = StaticThreadPool::with_threads(2).unwrap();
        let backend = pool.backend().clone();
        assert_eq!(backend.status(), PoolStatus::Running);

        drop(pool);
        assert_eq!(backend.status(), PoolStatus::Idle);
        assert_eq!(backend.live_workers(), 0);
    }

    #[test]
    fn drop_drains_pending_work() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = StaticThreadPool::with_threads(2).unwrap();
            let executor = pool.executor().require(crate::Blocking::Never);
            for _ in 0..50 {
                let counter = counter.clone();
                executor
                    .execute(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        }

        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
