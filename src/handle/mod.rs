//! The completion handle: a one-shot producer/consumer pair around a
//! single-assignment slot.
//!
//! Shaped like a `Channel`'s `Sender`/`Receiver` split — one `Arc<Inner>`
//! shared by two distinct, non-`Clone` front-ends — but the inner
//! synchronization is a `Mutex` + `Condvar` rather than lock-free atomics,
//! since [`Consumer::wait`]/[`Consumer::wait_until`] need to block the
//! calling thread, something a busy-spin/async-only channel never has to do.

mod slot;

pub use slot::PollState;
use slot::Slot;

use crate::error::PoolError;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[cfg(feature = "async")]
use futures::task::AtomicWaker;

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    filled: Condvar,
    #[cfg(feature = "async")]
    waker: AtomicWaker,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            filled: Condvar::new(),
            #[cfg(feature = "async")]
            waker: AtomicWaker::new(),
        }
    }

    fn complete(&self, value: Slot<T>) {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        // Invariant (exactly-once completion): a slot transitions out of
        // `Empty` at most once. A worker that races this is a pool bug.
        if guard.is_filled() {
            return;
        }
        *guard = value;
        drop(guard);
        self.filled.notify_all();
        #[cfg(feature = "async")]
        self.waker.wake();
    }
}

/// The pool-internal writer half of a completion handle.
///
/// Exactly one of `complete_value`/`complete_failure` is called, exactly
/// once, by the envelope that owns this producer.
pub(crate) struct Producer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Producer<T> {
    pub(crate) fn complete_value(self, value: T) {
        self.inner.complete(Slot::Value(value));
    }

    pub(crate) fn complete_failure(self, err: PoolError) {
        self.inner.complete(Slot::Failure(err));
    }
}

/// The caller-facing observer of a single future result.
///
/// Cloning is intentionally not supported: only one consumer may ever
/// `take` the slot. Polling and waiting, however, may be performed any
/// number of times by the same owner (or concurrently, since the inner
/// `Mutex`/`Condvar` pair is safe for shared observation).
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

/// Returns a fresh producer/consumer pair sharing one empty slot.
pub(crate) fn pair<T>() -> (Producer<T>, Consumer<T>) {
    let inner = Arc::new(Inner::new());
    (
        Producer {
            inner: inner.clone(),
        },
        Consumer { inner },
    )
}

impl<T> Consumer<T> {
    /// Non-blocking. Returns the slot's current state without consuming it.
    pub fn poll(&self) -> PollState {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .peek()
    }

    /// Non-blocking readiness check used by the deferred-argument wrapper;
    /// equivalent to `self.poll() != PollState::Empty`.
    pub(crate) fn is_ready(&self) -> bool {
        self.poll() != PollState::Empty
    }

    /// Blocks until the slot is non-empty.
    pub fn wait(&self) {
        let guard = self.inner.slot.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = self
            .inner
            .filled
            .wait_while(guard, |s| !s.is_filled())
            .unwrap_or_else(|e| e.into_inner());
    }

    /// Blocks until the slot is non-empty or `deadline` elapses.
    ///
    /// Returns `true` if the slot became non-empty before the deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return self.poll() != PollState::Empty;
            }
            let timeout = deadline - now;
            let guard = self.inner.slot.lock().unwrap_or_else(|e| e.into_inner());
            if guard.is_filled() {
                return true;
            }
            let (guard, result) = self
                .inner
                .filled
                .wait_timeout(guard, timeout)
                .unwrap_or_else(|e| e.into_inner());
            if guard.is_filled() {
                return true;
            }
            if result.timed_out() {
                return false;
            }
        }
    }

    /// Blocks until the slot is non-empty, for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Blocks until non-empty, then consumes the slot and returns the value
    /// or re-raises the failure.
    ///
    /// Calling `take` twice returns [`PoolError::HandleDoubleTake`] on the
    /// second call; it never blocks in that case.
    pub fn take(&self) -> Result<T, PoolError> {
        let guard = self.inner.slot.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*guard, Slot::Taken) {
            return Err(PoolError::HandleDoubleTake);
        }
        let mut guard = self
            .inner
            .filled
            .wait_while(guard, |s| !s.is_filled())
            .unwrap_or_else(|e| e.into_inner());
        match std::mem::replace(&mut *guard, Slot::Taken) {
            Slot::Value(v) => Ok(v),
            Slot::Failure(e) => Err(e),
            Slot::Taken => Err(PoolError::HandleDoubleTake),
            Slot::Empty => unreachable!("wait_while guarantees the slot is filled"),
        }
    }
}

#[cfg(feature = "async")]
impl<T> std::future::Future for Consumer<T> {
    type Output = Result<T, PoolError>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        use std::task::Poll;

        // Register first, then check, to avoid the classic missed-wakeup
        // race between the producer firing and us registering interest.
        self.inner.waker.register(cx.waker());

        let mut guard = self.inner.slot.lock().unwrap_or_else(|e| e.into_inner());
        if !guard.is_filled() {
            return Poll::Pending;
        }
        match std::mem::replace(&mut *guard, Slot::Taken) {
            Slot::Value(v) => Poll::Ready(Ok(v)),
            Slot::Failure(e) => Poll::Ready(Err(e)),
            Slot::Taken => Poll::Ready(Err(PoolError::HandleDoubleTake)),
            Slot::Empty => unreachable!("checked above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn poll_is_empty_until_completed() {
        let (tx, rx) = pair::<i32>();
        assert_eq!(rx.poll(), PollState::Empty);
        tx.complete_value(42);
        assert_eq!(rx.poll(), PollState::HasValue);
        assert_eq!(rx.take().unwrap(), 42);
    }

    #[test]
    fn take_re_raises_failure() {
        let (tx, rx) = pair::<i32>();
        tx.complete_failure(PoolError::TaskFailure("boom".into()));
        let err = rx.take().unwrap_err();
        assert!(matches!(err, PoolError::TaskFailure(m) if m == "boom"));
    }

    #[test]
    fn double_take_errors_without_blocking() {
        let (tx, rx) = pair::<i32>();
        tx.complete_value(1);
        assert_eq!(rx.take().unwrap(), 1);
        assert!(matches!(rx.take(), Err(PoolError::HandleDoubleTake)));
    }

    #[test]
    fn wait_blocks_until_producer_completes() {
        let (tx, rx) = pair::<i32>();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            tx.complete_value(7);
        });
        rx.wait();
        assert_eq!(rx.take().unwrap(), 7);
        t.join().unwrap();
    }

    #[test]
    fn wait_until_times_out_before_completion() {
        let (tx, rx) = pair::<i32>();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!rx.wait_until(deadline));
        tx.complete_value(1);
        assert!(rx.wait_until(Instant::now() + Duration::from_millis(50)));
    }

    #[test]
    fn dropping_consumer_before_fill_is_harmless() {
        let (tx, rx) = pair::<i32>();
        drop(rx);
        tx.complete_value(1);
    }
}
