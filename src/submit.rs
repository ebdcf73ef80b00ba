//! The generic engine behind every `Pool::submit*` entry point.
//!
//! Each concrete submission method (plain, cancellation-aware, allocator-
//! aware, and their combinations, for dependency arities 0 through 4) is a
//! thin wrapper that builds an [`crate::arg::ArgTuple`] and a closure over
//! it, then calls [`build_envelope`] once. Keeping this one generic function
//! at the center is what lets the four orthogonal submission classifications compose
//! without a combinatorial explosion of hand-written scheduling logic.

use crate::arg::ArgTuple;
use crate::envelope::{self, Envelope};
use crate::error::PoolError;
use crate::handle::{self, Consumer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Builds the envelope for a submission whose resolved argument values are
/// fed to `f`.
///
/// The argument tuple lives behind a `Mutex<Option<_>>` shared by the
/// envelope's `ready` and `execute` closures: `ready` only ever peeks through
/// [`ArgTuple::all_ready`], while `execute` takes the tuple out exactly once
/// and resolves it through [`ArgTuple::take_all`].
///
/// `aborting` is the pool's own abort flag. If it has been set by the time
/// the callable finishes — whether or not the callable itself opted into
/// observing cancellation — the result is discarded and the handle is
/// completed with [`PoolError::Cancelled`] instead: a task racing teardown
/// produced a result nobody asked for once the pool is tearing down.
pub(crate) fn build_envelope<A, F, R>(
    args: A,
    f: F,
    aborting: Arc<AtomicBool>,
) -> (Envelope, Consumer<R>)
where
    A: ArgTuple,
    F: FnOnce(A::Output) -> R + Send + 'static,
    R: Send + 'static,
{
    let slot = Mutex::new(Some(args));
    let ready_slot = std::sync::Arc::new(slot);
    let execute_slot = ready_slot.clone();

    let ready = move || match &*ready_slot.lock().unwrap_or_else(|e| e.into_inner()) {
        Some(args) => args.all_ready(),
        // Already handed off to `execute`; nothing left to wait on.
        None => true,
    };

    let (producer, consumer) = handle::pair();
    let producer = Arc::new(Mutex::new(Some(producer)));
    let cancel_producer = producer.clone();

    let execute = move || {
        let args = execute_slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("envelope executed more than once");

        let outcome = envelope::run_catching(move || {
            let values = args.take_all()?;
            Ok::<R, PoolError>(f(values))
        });

        let Some(producer) = producer.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return; // already cancelled out from under us
        };

        if aborting.load(Ordering::Acquire) {
            tracing::warn!("task result discarded: pool aborted during execution");
            producer.complete_failure(PoolError::Cancelled);
            return;
        }

        match outcome {
            Ok(Ok(value)) => producer.complete_value(value),
            Ok(Err(dependency_failure)) => {
                tracing::warn!(error = %dependency_failure, "task dependency failed");
                producer.complete_failure(dependency_failure);
            }
            Err(panic_failure) => {
                tracing::warn!(error = %panic_failure, "task panicked");
                producer.complete_failure(panic_failure);
            }
        }
    };

    let cancel = move || {
        if let Some(producer) = cancel_producer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            producer.complete_failure(PoolError::Cancelled);
        }
    };

    (Envelope::new(ready, execute, cancel), consumer)
}

/// Builds a handle that is immediately completed with `err`, for submissions
/// rejected outright by the lifecycle controller.
pub(crate) fn rejected<R: Send + 'static>(err: PoolError) -> Consumer<R> {
    let (producer, consumer) = handle::pair();
    producer.complete_failure(err);
    consumer
}
