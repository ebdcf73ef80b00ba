//! The per-thread loop every worker runs.

use crate::pool::PoolInner;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const COARSE_TIMEOUT: Duration = Duration::from_millis(1);

pub(crate) fn run(id: usize, inner: Arc<PoolInner>) {
    tracing::trace!(worker = id, "worker starting");

    loop {
        // Step 1: opportunistic promotion. Exactly one worker wins the
        // try_lock race per cycle; the rest fall through to step 2.
        inner.waiting.try_promote(&inner.ready, &inner.counters);

        let timeout = if inner.counters.waiting() > 0 {
            inner.check_latency
        } else {
            COARSE_TIMEOUT
        };

        // Step 2: wait for work.
        let mut guard = inner.ready.queue.lock().unwrap_or_else(|e| e.into_inner());
        while guard.is_empty() && !inner.aborting.load(Ordering::Acquire) {
            let (g, timed_out) = inner
                .ready
                .cond
                .wait_timeout(guard, timeout)
                .unwrap_or_else(|e| e.into_inner());
            guard = g;
            if timed_out.timed_out() {
                break;
            }
        }

        // Step 3: abort check.
        if inner.aborting.load(Ordering::Acquire) {
            drop(guard);
            break;
        }

        if guard.is_empty() {
            // The coarse/check-latency timeout elapsed with nothing to do;
            // loop back to step 1 and try promoting again.
            drop(guard);
            continue;
        }

        // Step 4: paused check.
        if inner.paused.load(Ordering::Acquire) {
            drop(guard);
            std::thread::yield_now();
            continue;
        }

        // Step 5: dequeue. Increment `running` before decrementing `queued`
        // so the envelope is never counted in neither bucket, the same
        // total()-never-dips discipline as queue routing and promotion.
        let env = guard
            .pop_front()
            .expect("queue was checked non-empty above");
        inner.counters.inc_running();
        inner.counters.dec_queued();
        drop(guard);

        // Step 6: execute. The envelope itself completes its producer
        // handle, converting any panic into a TaskFailure.
        env.execute();

        // Step 7: finalize.
        inner.counters.dec_running();
        inner.notify_drain();
    }

    tracing::trace!(worker = id, "worker stopping");
}
