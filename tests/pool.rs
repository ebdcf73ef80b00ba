//! End-to-end scenarios exercising the pool as a whole.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use task_pool::{Arg, PollState, Pool, PoolError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn single_submission_returns_its_value() {
    init_tracing();
    let pool = Pool::new(1);
    let handle = pool.submit(|| 42);
    assert_eq!(handle.take().unwrap(), 42);
}

#[test]
fn pause_then_drain_settles_counts_to_zero() {
    let pool = Pool::new(2);
    pool.pause();

    let a = pool.submit(|| {
        std::thread::sleep(Duration::from_millis(50));
        1
    });
    let b = pool.submit(|| {
        std::thread::sleep(Duration::from_millis(50));
        2
    });

    assert_eq!(pool.total_count(), 2);

    pool.unpause();
    assert!(pool.drain_deadline(Instant::now() + Duration::from_secs(2)));

    assert_eq!(pool.total_count(), 0);
    assert_eq!(a.take().unwrap(), 1);
    assert_eq!(b.take().unwrap(), 2);
}

#[test]
fn dependent_submission_runs_after_its_dependency() {
    let pool = Pool::new(2);
    let a = pool.submit(|| 7);
    let b = pool.submit_with(a, |x: i32| x * 6);
    assert_eq!(b.take().unwrap(), 42);
}

#[test]
fn panicking_task_surfaces_its_message_and_counts_recover() {
    let pool = Pool::new(1);
    let handle = pool.submit(|| -> i32 { panic!("boom") });

    match handle.take() {
        Err(PoolError::TaskFailure(msg)) => assert_eq!(msg, "boom"),
        other => panic!("expected TaskFailure(\"boom\"), got {other:?}"),
    }

    assert!(pool.drain_deadline(Instant::now() + Duration::from_secs(1)));
    assert_eq!(pool.total_count(), 0);
}

#[test]
fn thousand_tasks_increment_a_shared_counter_exactly_once_each() {
    let pool = Pool::new(4);
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..1000)
        .map(|_| {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
        })
        .collect();

    for h in handles {
        h.take().unwrap();
    }

    assert_eq!(counter.load(Ordering::Acquire), 1000);
}

#[test]
fn destroying_the_pool_cancels_a_cooperating_long_task_promptly() {
    let pool = Pool::new(1);
    let handle = pool.submit_cancellable(|stop| {
        while !stop.is_cancelled() {
            std::thread::sleep(Duration::from_millis(1));
        }
    });

    let start = Instant::now();
    drop(pool);
    assert!(start.elapsed() < Duration::from_secs(1));

    assert!(matches!(handle.take(), Err(PoolError::Cancelled)));
}

#[test]
fn polling_a_dependent_handle_before_its_dependency_completes_is_empty() {
    let pool = Pool::new(2);
    let a = pool.submit(|| {
        std::thread::sleep(Duration::from_millis(200));
        1
    });
    let b = pool.submit_with(a, |x: i32| x + 1);

    assert_eq!(b.poll(), PollState::Empty);
    assert_eq!(b.take().unwrap(), 2);
}

#[test]
fn fifo_order_for_two_ready_submissions_on_one_worker() {
    let pool = Pool::new(1);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let o1 = order.clone();
    let s1 = pool.submit(move || o1.lock().unwrap().push(1));
    let o2 = order.clone();
    let s2 = pool.submit(move || o2.lock().unwrap().push(2));

    s1.take().unwrap();
    s2.take().unwrap();

    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
}

#[test]
fn drain_does_not_set_the_cancellation_flag() {
    let pool = Pool::new(1);
    let token = pool.stop_token();
    let handle = pool.submit(|| {
        std::thread::sleep(Duration::from_millis(30));
        "done"
    });

    assert!(pool.drain_deadline(Instant::now() + Duration::from_secs(1)));
    assert!(!token.is_cancelled());
    assert_eq!(handle.take().unwrap(), "done");
}

#[test]
fn a_cancelled_dependency_propagates_to_its_dependent() {
    let pool = Pool::new(1);
    let a = pool.submit(|| -> i32 { panic!("upstream failure") });
    let b = pool.submit_with(a, |x: i32| x + 1);

    match b.take() {
        Err(PoolError::TaskFailure(msg)) => assert_eq!(msg, "upstream failure"),
        other => panic!("expected the upstream failure to propagate, got {other:?}"),
    }
}

#[test]
fn submission_after_abort_is_rejected() {
    let pool = Pool::new(1);
    pool.abort();
    let handle = pool.submit(|| 1);
    assert!(matches!(handle.take(), Err(PoolError::SubmissionRejected)));
}

#[test]
fn reset_completes_handles_enqueued_before_it_with_cancelled() {
    let pool = Pool::new(1);
    pool.pause();
    let handle = pool.submit(|| 1);
    pool.reset(1);
    assert!(matches!(handle.take(), Err(PoolError::Cancelled)));
}

#[test]
fn mixed_immediate_and_pending_arguments_both_resolve() {
    let pool = Pool::new(2);
    let a = pool.submit(|| 10);
    let result = pool.submit_with2(Arg::value(5), Arg::from(a), |x: i32, y: i32| x + y);
    assert_eq!(result.take().unwrap(), 15);
}

#[test]
fn allocator_aware_submission_receives_the_pool_allocator() {
    let pool = Pool::new(1);
    let handle = pool.submit_with_allocator(|alloc| {
        let ptr = alloc.allocate(16, 8).expect("allocation should succeed");
        unsafe {
            alloc.deallocate(ptr, 16, 8);
        }
        "ok"
    });
    assert_eq!(handle.take().unwrap(), "ok");
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

#[test]
fn aborting_drops_storage_of_envelopes_that_never_ran() {
    let pool = Pool::new(1);
    pool.pause();

    let drops = Arc::new(AtomicUsize::new(0));
    let captured = DropCounter(drops.clone());
    let handle = pool.submit(move || {
        let _keep_alive = captured;
    });

    assert_eq!(drops.load(Ordering::Acquire), 0);

    pool.abort();

    assert_eq!(drops.load(Ordering::Acquire), 1);
    assert!(matches!(handle.take(), Err(PoolError::Cancelled)));
}

#[test]
fn deferred_submission_runs_only_on_explicit_run_deferred() {
    let pool = Pool::new(1);
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_c = ran.clone();
    let handle = pool.submit_deferred(move || {
        ran_c.fetch_add(1, Ordering::AcqRel);
        99
    });

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(ran.load(Ordering::Acquire), 0);
    assert_eq!(handle.poll(), PollState::Empty);

    pool.run_deferred();
    assert_eq!(handle.take().unwrap(), 99);
}

#[cfg(feature = "async")]
#[tokio::test]
async fn consumer_can_be_awaited_under_the_async_feature() {
    init_tracing();
    let pool = Pool::new(2);
    let a = pool.submit(|| 7);
    let b = pool.submit_with(a, |x: i32| x * 6);
    assert_eq!(b.await.unwrap(), 42);
}
