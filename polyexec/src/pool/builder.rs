use super::ThreadPoolBackend;
use crate::context::StaticThreadPool;
use crate::error::Result;

use tracing::warn;

use std::thread;

/// Settings of a worker pool, as produced by [`ThreadPoolBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    /// Number of worker threads.
    pub worker_threads: usize,

    /// Thread name prefix; workers are named `{prefix}-{index}`.
    pub thread_name: String,

    /// Stack size of each worker, or the platform default.
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    /// One worker per logical CPU, falling back to `1` if unknown.
    fn default() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: "polyexec-worker".to_owned(),
            stack_size: None,
        }
    }
}

/// Builder for configuring and creating worker pools.
///
/// # Examples
///
/// ```rust,ignore
/// let pool = ThreadPoolBuilder::new()
///     .worker_threads(4)
///     .thread_name("render")
///     .build()?;
///
/// pool.executor().execute(|| println!("hello from render-N"))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ThreadPoolBuilder {
    config: ThreadPoolConfig,
}

impl ThreadPoolBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    ///
    /// Zero is accepted, but such a pool never runs anything.
    pub fn worker_threads(mut self, n: usize) -> Self {
        if n == 0 {
            warn!("worker_threads set to 0; the pool will never make progress");
        }

        self.config.worker_threads = n;
        self
    }

    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Builds an idle backend; nothing is spawned until it is started.
    pub fn build_backend(self) -> ThreadPoolBackend {
        ThreadPoolBackend::with_config(self.config)
    }

    /// Builds and starts a pool owned by an execution context.
    pub fn build(self) -> Result<StaticThreadPool> {
        StaticThreadPool::new(self.build_backend())
    }
}
