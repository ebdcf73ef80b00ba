//! Submission front-end and lifecycle controller: the pool itself.

use crate::alloc::{Allocator, SystemAllocator};
use crate::arg::Arg;
use crate::cancel::{CancellationFlag, StopToken};
use crate::counters::Counters;
use crate::envelope::Envelope;
use crate::error::PoolError;
use crate::handle::Consumer;
use crate::queue::{DeferredQueue, ReadyQueue, WaitingSet};
use crate::submit::{build_envelope, rejected};
use crate::worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default interval at which a worker re-checks the waiting set while
/// tasks are parked there.
pub const DEFAULT_CHECK_LATENCY: Duration = Duration::from_micros(500);

pub(crate) struct PoolInner {
    pub(crate) ready: ReadyQueue,
    pub(crate) waiting: WaitingSet,
    pub(crate) deferred: DeferredQueue,
    pub(crate) counters: Counters,
    pub(crate) cancel: Mutex<CancellationFlag>,
    pub(crate) paused: AtomicBool,
    pub(crate) aborting: Arc<AtomicBool>,
    pub(crate) terminated: AtomicBool,
    pub(crate) check_latency: Duration,
    pub(crate) allocator: Arc<dyn Allocator>,
    drain_lock: Mutex<()>,
    drain_cond: Condvar,
}

impl PoolInner {
    pub(crate) fn notify_drain(&self) {
        // Cheap: a single bool store's worth of contention, and only workers
        // that just finished a task take this path.
        let _guard = self.drain_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.drain_cond.notify_all();
    }

    fn route(&self, env: Envelope) {
        // Count the envelope before it becomes visible/dequeuable in either
        // queue: otherwise a worker could pop and `dec_*` it while the
        // matching `inc_*` hasn't landed yet, which both underflows the
        // atomic and lets a concurrent `total()` read see a false zero.
        if env.is_ready() {
            self.counters.inc_queued();
            self.ready.push(env);
        } else {
            self.counters.inc_waiting();
            self.waiting.push(env);
            // A blocked worker may need to re-poll the waiting set rather
            // than just the ready queue; wake one either way.
            self.ready.notify_all();
        }
    }
}

/// A fixed-size worker pool that executes heterogeneous tasks, including
/// ones whose inputs are the not-yet-ready results of other submissions.
///
/// See the crate root docs for the full lifecycle and scheduling model.
pub struct Pool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    thread_count: usize,
}

fn resolve_thread_count(requested: usize) -> usize {
    if requested != 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

fn spawn_workers(inner: &Arc<PoolInner>, count: usize) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let inner = inner.clone();
            std::thread::Builder::new()
                .name(format!("task-pool-worker-{id}"))
                .spawn(move || worker::run(id, inner))
                .expect("failed to spawn pool worker thread")
        })
        .collect()
}

impl Pool {
    /// Constructs a pool with `thread_count` workers (0 means "detected
    /// hardware parallelism, or 1 if that can't be determined") and the
    /// default check latency.
    pub fn new(thread_count: usize) -> Self {
        Self::with_config(thread_count, DEFAULT_CHECK_LATENCY)
    }

    /// Constructs a pool with an explicit check latency, bounding how long a
    /// newly-ready waiting task may sit before promotion.
    pub fn with_config(thread_count: usize, check_latency: Duration) -> Self {
        Self::build(thread_count, check_latency, Arc::new(SystemAllocator))
    }

    /// Constructs a pool whose allocator-aware submissions are handed
    /// `allocator` instead of the default [`SystemAllocator`].
    pub fn with_allocator(
        thread_count: usize,
        check_latency: Duration,
        allocator: Arc<dyn Allocator>,
    ) -> Self {
        Self::build(thread_count, check_latency, allocator)
    }

    fn build(thread_count: usize, check_latency: Duration, allocator: Arc<dyn Allocator>) -> Self {
        let thread_count = resolve_thread_count(thread_count);
        let inner = Arc::new(PoolInner {
            ready: ReadyQueue::default(),
            waiting: WaitingSet::default(),
            deferred: DeferredQueue::default(),
            counters: Counters::default(),
            cancel: Mutex::new(CancellationFlag::new()),
            paused: AtomicBool::new(false),
            aborting: Arc::new(AtomicBool::new(false)),
            terminated: AtomicBool::new(false),
            check_latency,
            allocator,
            drain_lock: Mutex::new(()),
            drain_cond: Condvar::new(),
        });
        tracing::debug!(threads = thread_count, "pool constructed");
        let workers = spawn_workers(&inner, thread_count);
        Self {
            inner,
            workers: Mutex::new(workers),
            thread_count,
        }
    }

    fn accepting(&self) -> Result<(), PoolError> {
        if self.inner.terminated.load(Ordering::Acquire) {
            return Err(PoolError::SubmissionRejected);
        }
        if self.inner.aborting.load(Ordering::Acquire) {
            return Err(PoolError::Cancelled);
        }
        Ok(())
    }

    // ---- submission front-end ---------------------------------------

    /// Submits an immediate, non-cancellable, zero-dependency task.
    pub fn submit<F, R>(&self, f: F) -> Consumer<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.accepting() {
            Ok(()) => {
                let (env, consumer) = build_envelope((), move |()| f(), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits a task depending on one prior submission's result.
    pub fn submit_with<A, F, R>(&self, dep: impl Into<Arg<A>>, f: F) -> Consumer<R>
    where
        A: Send + 'static,
        F: FnOnce(A) -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.accepting() {
            Ok(()) => {
                let (env, consumer) = build_envelope((dep.into(),), move |(a,)| f(a), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits a task depending on two prior submissions' results (or plain
    /// values, or a mix — see [`Arg`]).
    pub fn submit_with2<A, B, F, R>(
        &self,
        dep1: impl Into<Arg<A>>,
        dep2: impl Into<Arg<B>>,
        f: F,
    ) -> Consumer<R>
    where
        A: Send + 'static,
        B: Send + 'static,
        F: FnOnce(A, B) -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.accepting() {
            Ok(()) => {
                let (env, consumer) =
                    build_envelope((dep1.into(), dep2.into()), move |(a, b)| f(a, b), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits a cancellation-aware, zero-dependency task: `f` receives a
    /// [`StopToken`] view of the pool's cancellation flag as its only
    /// argument.
    pub fn submit_cancellable<F, R>(&self, f: F) -> Consumer<R>
    where
        F: FnOnce(StopToken) -> R + Send + 'static,
        R: Send + 'static,
    {
        let token = self.stop_token();
        match self.accepting() {
            Ok(()) => {
                let (env, consumer) = build_envelope((), move |()| f(token), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits a cancellation-aware task depending on one prior submission.
    pub fn submit_cancellable_with<A, F, R>(&self, dep: impl Into<Arg<A>>, f: F) -> Consumer<R>
    where
        A: Send + 'static,
        F: FnOnce(A, StopToken) -> R + Send + 'static,
        R: Send + 'static,
    {
        let token = self.stop_token();
        match self.accepting() {
            Ok(()) => {
                let (env, consumer) = build_envelope((dep.into(),), move |(a,)| f(a, token), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits an allocator-aware, zero-dependency task: `f` receives the
    /// pool's allocator as its first argument.
    pub fn submit_with_allocator<F, R>(&self, f: F) -> Consumer<R>
    where
        F: FnOnce(&dyn Allocator) -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.accepting() {
            Ok(()) => {
                let allocator = self.inner.allocator.clone();
                let (env, consumer) = build_envelope((), move |()| f(&*allocator), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits a task that is both cancellation-aware and allocator-aware.
    pub fn submit_cancellable_with_allocator<F, R>(&self, f: F) -> Consumer<R>
    where
        F: FnOnce(&dyn Allocator, StopToken) -> R + Send + 'static,
        R: Send + 'static,
    {
        let token = self.stop_token();
        match self.accepting() {
            Ok(()) => {
                let allocator = self.inner.allocator.clone();
                let (env, consumer) = build_envelope((), move |()| f(&*allocator, token), self.inner.aborting.clone());
                self.inner.route(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Submits in deferred mode: the envelope is parked in the deferred
    /// queue and never touched by a worker until [`Pool::run_deferred`] is
    /// called on the caller's thread. Counters are unaffected.
    pub fn submit_deferred<F, R>(&self, f: F) -> Consumer<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.accepting() {
            Ok(()) => {
                let (env, consumer) = build_envelope((), move |()| f(), self.inner.aborting.clone());
                self.inner.deferred.push(env);
                consumer
            }
            Err(e) => rejected(e),
        }
    }

    /// Drains the deferred queue synchronously on the calling thread
    /// every envelope that is ready executes here and now; every
    /// envelope that is not ready is re-pushed for a future call.
    pub fn run_deferred(&self) {
        let pending = {
            let mut guard = self
                .inner
                .deferred
                .queue
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for env in pending {
            if env.is_ready() {
                self.inner.counters.inc_running();
                env.execute();
                self.inner.counters.dec_running();
            } else {
                self.inner.deferred.push(env);
            }
        }
    }

    // ---- lifecycle controller -----------------------------------------

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Release);
        tracing::debug!("pool paused");
    }

    pub fn unpause(&self) {
        self.inner.paused.store(false, Ordering::Release);
        self.inner.ready.notify_all();
        tracing::debug!("pool unpaused");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Blocks until `queued + waiting + running == 0`, or returns
    /// immediately if the pool is paused: draining while paused would
    /// otherwise deadlock, since paused workers never dequeue.
    pub fn drain(&self) {
        self.drain_until(None);
    }

    /// As [`Pool::drain`], but gives up and returns `false` if `deadline`
    /// elapses first.
    pub fn drain_deadline(&self, deadline: Instant) -> bool {
        self.drain_until(Some(deadline))
    }

    fn drain_until(&self, deadline: Option<Instant>) -> bool {
        tracing::debug!("drain starting");
        self.inner.ready.notify_all();
        let mut guard = self
            .inner
            .drain_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        loop {
            if self.inner.paused.load(Ordering::Acquire) {
                tracing::debug!("drain returning early: pool is paused");
                return false;
            }
            if self.inner.counters.total() == 0 {
                tracing::debug!("drain complete");
                return true;
            }
            guard = match deadline {
                None => self
                    .inner
                    .drain_cond
                    .wait_timeout(guard, Duration::from_millis(5))
                    .unwrap_or_else(|e| e.into_inner())
                    .0,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::debug!("drain timed out");
                        return false;
                    }
                    self.inner
                        .drain_cond
                        .wait_timeout(guard, (deadline - now).min(Duration::from_millis(5)))
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }

    /// Sets the cancellation flag, wakes every worker, and joins them. The
    /// pool transitions to *terminated*; further submissions are rejected
    /// until [`Pool::reset`].
    ///
    /// All envelopes still in the ready queue or waiting set are destroyed,
    /// completing their handles with [`PoolError::Cancelled`].
    pub fn abort(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return; // already terminated; idempotent
        }
        tracing::warn!("pool aborting");
        self.inner.aborting.store(true, Ordering::Release);
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fire();
        self.inner.ready.notify_all();

        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            let _ = handle.join();
        }

        self.cancel_outstanding();
    }

    /// Completes every envelope still in the ready queue or waiting set with
    /// [`PoolError::Cancelled`], rather than letting them run, and without
    /// ever invoking the user callable.
    fn cancel_outstanding(&self) {
        // Settle each handle before dropping the count that was covering it,
        // so a concurrent total() never reads zero while a handle is still
        // Empty.
        for env in self.inner.ready.drain_all() {
            env.cancel();
            self.inner.counters.dec_queued();
        }
        for env in self.inner.waiting.drain_all() {
            env.cancel();
            self.inner.counters.dec_waiting();
        }
    }

    /// Pauses, drains, tears down every worker thread, then constructs a
    /// fresh cancellation flag and worker set, restoring the previous
    /// paused/running state.
    ///
    /// Any consumer handle whose envelope had not yet run is completed with
    /// [`PoolError::Cancelled`] rather than left to hang forever.
    pub fn reset(&self, thread_count: usize) {
        let was_paused = self.inner.paused.load(Ordering::Acquire);
        self.pause();
        self.drain();

        self.inner.aborting.store(true, Ordering::Release);
        self.inner.ready.notify_all();
        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            let _ = handle.join();
        }
        self.cancel_outstanding();

        *self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = CancellationFlag::new();
        self.inner.aborting.store(false, Ordering::Release);
        self.inner.terminated.store(false, Ordering::Release);
        self.inner.paused.store(was_paused, Ordering::Release);

        let thread_count = resolve_thread_count(thread_count);
        let new_workers = spawn_workers(&self.inner, thread_count);
        *self.workers.lock().unwrap_or_else(|e| e.into_inner()) = new_workers;
        tracing::debug!(threads = thread_count, "pool reset");
    }

    /// A view of the pool's current cancellation flag, for callers that want
    /// to observe it without going through a cancellation-aware submission.
    pub fn stop_token(&self) -> StopToken {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .view()
    }

    // ---- counters ----------------------------------------------------------

    pub fn queued_count(&self) -> usize {
        self.inner.counters.queued()
    }

    pub fn waiting_count(&self) -> usize {
        self.inner.counters.waiting()
    }

    pub fn running_count(&self) -> usize {
        self.inner.counters.running()
    }

    pub fn total_count(&self) -> usize {
        self.inner.counters.total()
    }

    /// The number of worker threads this pool was (re)constructed with.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }
}

impl Drop for Pool {
    /// Fires the cancellation flag and joins every worker, exactly like
    /// `abort`, so a pool going out of scope never leaves detached threads
    /// behind: destruction always fires the flag, unlike a normal drain.
    fn drop(&mut self) {
        self.abort();
    }
}
