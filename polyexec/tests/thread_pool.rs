mod common;

use polyexec::backend::Backend;
use polyexec::pool::{ThreadPoolBackend, current_worker};
use polyexec::{Blocking, ExecError, PoolStatus, StaticThreadPool, ThreadPoolBuilder, WorkName};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_lifecycle_round_trip() {
    common::init_tracing();
    let pool = ThreadPoolBackend::new(2);
    let work = WorkName::anonymous();

    let err = pool.enqueue(&work, Box::new(|| {})).unwrap_err();
    assert!(matches!(
        err,
        ExecError::NotRunning {
            status: PoolStatus::Idle,
            ..
        }
    ));

    pool.start().unwrap();
    pool.start().unwrap();
    assert_eq!(pool.status(), PoolStatus::Running);
    assert_eq!(pool.live_workers(), 2);

    pool.stop();
    pool.start().unwrap();
    assert_eq!(pool.status(), PoolStatus::Shutdown);
    assert!(pool.enqueue(&work, Box::new(|| {})).is_err());

    pool.join();
    assert_eq!(pool.status(), PoolStatus::Idle);
    assert_eq!(pool.live_workers(), 0);

    pool.start().unwrap();
    assert!(pool.enqueue(&work, Box::new(|| {})).is_ok());
    pool.join();
}

#[test]
fn test_wait_without_work_returns() {
    common::init_tracing();
    let pool = StaticThreadPool::with_threads(3).unwrap();

    pool.wait();
    pool.wait();
    assert_eq!(pool.backend().status(), PoolStatus::Running);
}

#[test]
fn test_wait_covers_every_submitted_item() {
    common::init_tracing();
    let pool = StaticThreadPool::with_threads(4).unwrap();
    let executor = pool.executor().require(Blocking::Never);
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let counter = counter.clone();
        executor
            .execute(move || {
                thread::sleep(Duration::from_micros(50));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    pool.wait();
    assert_eq!(counter.load(Ordering::SeqCst), 200);
    assert_eq!(pool.backend().in_flight(), 0);
    assert_eq!(pool.backend().queued(), 0);
}

#[test]
fn test_concurrent_producers() {
    common::init_tracing();
    let pool = StaticThreadPool::with_threads(4).unwrap();
    let executor = pool.executor().require(Blocking::Never);
    let counter = Arc::new(AtomicUsize::new(0));

    thread::scope(|scope| {
        for _ in 0..4 {
            let executor = executor.clone();
            let counter = counter.clone();
            scope.spawn(move || {
                for _ in 0..250 {
                    let counter = counter.clone();
                    executor
                        .execute(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            });
        }
    });

    pool.wait();
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_work_spreads_over_workers() {
    common::init_tracing();
    let pool = ThreadPoolBuilder::new()
        .worker_threads(4)
        .thread_name("spread")
        .build()
        .unwrap();
    let executor = pool.executor().require(Blocking::Never);
    let seen = Arc::new(Mutex::new(HashSet::new()));

    for _ in 0..64 {
        let seen = seen.clone();
        executor
            .execute(move || {
                thread::sleep(Duration::from_millis(2));
                if let Some(worker) = current_worker() {
                    seen.lock().unwrap().insert(worker.index);
                }
            })
            .unwrap();
    }

    pool.wait();
    let seen = seen.lock().unwrap();
    assert!(seen.len() > 1);
    assert!(seen.iter().all(|index| *index < 4));
}

#[test]
fn test_panicking_job_is_contained() {
    common::init_tracing();
    let pool = StaticThreadPool::with_threads(1).unwrap();
    let executor = pool.executor();

    executor.execute(|| panic!("job exploded")).unwrap();
    assert_eq!(pool.backend().panicked_jobs(), 1);

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    executor
        .execute(move || flag.store(true, Ordering::SeqCst))
        .unwrap();

    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(pool.backend().status(), PoolStatus::Running);
}

#[test]
fn test_workers_may_submit_while_host_waits() {
    common::init_tracing();
    let pool = StaticThreadPool::with_threads(2).unwrap();
    let backend = pool.backend().clone();
    let nested_ran = Arc::new(AtomicBool::new(false));

    let flag = nested_ran.clone();
    let inner = backend.clone();
    backend
        .enqueue(
            &WorkName::new("outer"),
            Box::new(move || {
                thread::sleep(Duration::from_millis(20));
                inner
                    .enqueue(
                        &WorkName::new("nested"),
                        Box::new(move || flag.store(true, Ordering::SeqCst)),
                    )
                    .unwrap();
            }),
        )
        .unwrap();

    pool.wait();
    assert!(nested_ran.load(Ordering::SeqCst));
}

#[test]
fn test_blocking_submission_from_worker_does_not_deadlock() {
    common::init_tracing();
    let pool = StaticThreadPool::with_threads(1).unwrap();
    let executor = pool.executor().require(Blocking::Always);
    let counter = Arc::new(AtomicUsize::new(0));

    let nested = executor.clone();
    let outer_counter = counter.clone();
    executor
        .execute(move || {
            let inner_counter = outer_counter.clone();
            nested
                .execute(move || {
                    inner_counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            outer_counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_zero_worker_pool_shuts_down() {
    common::init_tracing();
    let pool = ThreadPoolBuilder::new().worker_threads(0).build().unwrap();

    assert_eq!(pool.backend().num_workers(), 0);
    assert_eq!(pool.backend().live_workers(), 0);
    drop(pool);
}
