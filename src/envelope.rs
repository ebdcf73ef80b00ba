//! The type-erased task envelope.
//!
//! An envelope is just three boxed closures plus whatever storage they
//! close over: a trait-object-like pattern, no inheritance needed.

use crate::error::PoolError;
use std::panic::{self, AssertUnwindSafe};

/// A move-only, run-at-most-once task record.
///
/// `ready` must be side-effect free, idempotent, non-blocking, and callable
/// from any thread holding the envelope's current queue/set lock. `execute`
/// consumes the envelope and is guaranteed by the pool to run at most once,
/// only once the envelope has been removed from every queue/set.
pub(crate) struct Envelope {
    ready: Box<dyn Fn() -> bool + Send>,
    execute: Box<dyn FnOnce() + Send>,
    cancel: Box<dyn FnOnce() + Send>,
}

impl Envelope {
    pub(crate) fn new(
        ready: impl Fn() -> bool + Send + 'static,
        execute: impl FnOnce() + Send + 'static,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            ready: Box::new(ready),
            execute: Box::new(execute),
            cancel: Box::new(cancel),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        (self.ready)()
    }

    pub(crate) fn execute(self) {
        (self.execute)();
    }

    /// Completes this envelope's handle with [`PoolError::Cancelled`] instead
    /// of ever invoking the user callable. Used for envelopes orphaned by
    /// `Pool::reset`.
    pub(crate) fn cancel(self) {
        (self.cancel)();
    }
}

/// Runs `f`, catching any panic and converting it into a [`PoolError::TaskFailure`].
pub(crate) fn run_catching<R>(f: impl FnOnce() -> R) -> Result<R, PoolError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked with a non-string payload".to_string()
        };
        PoolError::TaskFailure(msg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn execute_runs_exactly_once() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_c = ran.clone();
        let env = Envelope::new(
            || true,
            move || {
                ran_c.store(true, Ordering::SeqCst);
            },
            || {},
        );
        env.execute();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_runs_instead_of_execute() {
        let ran = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicBool::new(false));
        let ran_c = ran.clone();
        let cancelled_c = cancelled.clone();
        let env = Envelope::new(
            || true,
            move || ran_c.store(true, Ordering::SeqCst),
            move || cancelled_c.store(true, Ordering::SeqCst),
        );
        env.cancel();
        assert!(!ran.load(Ordering::SeqCst));
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn run_catching_converts_panic_to_task_failure() {
        let result = run_catching(|| -> i32 { panic!("boom") });
        match result {
            Err(PoolError::TaskFailure(msg)) => assert_eq!(msg, "boom"),
            _ => panic!("expected TaskFailure"),
        }
    }

    #[test]
    fn run_catching_passes_through_on_success() {
        let result = run_catching(|| 5);
        assert_eq!(result.unwrap(), 5);
    }
}
