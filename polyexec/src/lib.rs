//! # polyexec
//!
//! **polyexec** is a small execution-policy layer for Rust: one executor
//! front-end, several call shapes, and pluggable execution engines.
//!
//! Work is submitted through an [`Executor`] handle. The handle's call
//! shape decides what submission looks like (fire-and-forget, future
//! returning, bulk over a 3-D index space, or lazy through a task graph)
//! while its backend decides where the work runs. Two engines ship with the
//! crate:
//!
//! - a **static worker pool** ([`StaticThreadPool`]): a fixed set of OS
//!   threads draining one shared FIFO queue,
//! - an **in-order device queue** ([`accelerator::AcceleratorContext`]):
//!   commands run one at a time and report through completion signals.
//!
//! On top of the engines sits a lazy **task graph** ([`sender`]) with
//! `just`, `via`, `transform` and `bulk_transform` stages.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use polyexec::{StaticThreadPool, TwoWay, Blocking, just, via, sync_wait};
//!
//! let pool = StaticThreadPool::with_threads(4)?;
//!
//! // Fire and forget, then wait for quiescence.
//! pool.executor().require(Blocking::Never).execute(|| println!("hello"))?;
//! pool.wait();
//!
//! // Ask for a result.
//! let answer = pool.executor().require_concept(TwoWay).twoway_execute(|| 6 * 7)?;
//! assert_eq!(answer.get()?, 42);
//!
//! // Build a task that hops onto the pool.
//! let task = via(&pool.executor(), just(20)).transform(|v| v + 1);
//! assert_eq!(sync_wait(task)?, Some(21));
//! ```
//!
//! ## Modules
//!
//! - [`pool`]: the worker-pool backend and its builder
//! - [`executor`]: executor handles, call shapes and properties
//! - [`sender`]: lazy task graphs and receivers
//! - [`accelerator`]: device queue and completion signals
//! - [`future`]: the one-shot promise/future pair

pub mod accelerator;
pub mod backend;
pub mod context;
pub mod error;
pub mod executor;
pub mod future;
pub mod index;
pub mod pool;
pub mod queue;
pub mod sender;

pub use context::{ExecutionContext, StaticThreadPool};
pub use error::{ExecError, Result};
pub use executor::{Blocking, BulkOneWay, BulkTwoWay, Executor, Lazy, OneWay, TwoWay, WorkName};
pub use future::{FutureHandle, Promise, promise};
pub use index::{Index, Shape};
pub use pool::{PoolStatus, ThreadPoolBuilder};
pub use sender::{
    Receiver, Task, bulk_transform, just, just_done, just_error, submit, sync_wait, transform,
    try_transform, via,
};
