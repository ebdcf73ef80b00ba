//! The three envelope storages: ready queue, waiting set, deferred queue.
//!
//! Kept as separate lock-guarded structures rather than one queue polled in
//! a loop: dequeue from the
//! ready queue stays O(1), and the expensive readiness scan lives behind a
//! lock that workers only ever *try* to acquire.

use crate::counters::Counters;
use crate::envelope::Envelope;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// FIFO of envelopes whose arguments were all ready at insertion time.
#[derive(Default)]
pub(crate) struct ReadyQueue {
    pub(crate) queue: Mutex<VecDeque<Envelope>>,
    pub(crate) cond: Condvar,
}

impl ReadyQueue {
    pub(crate) fn push(&self, env: Envelope) {
        let mut guard = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        guard.push_back(env);
        drop(guard);
        self.cond.notify_one();
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub(crate) fn notify_all(&self) {
        self.cond.notify_all();
    }

    /// Drains every envelope, for abort/reset teardown.
    pub(crate) fn drain_all(&self) -> Vec<Envelope> {
        let mut guard = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        guard.drain(..).collect()
    }
}

/// Unordered collection of envelopes whose arguments are not yet all ready.
#[derive(Default)]
pub(crate) struct WaitingSet {
    pub(crate) envelopes: Mutex<Vec<Envelope>>,
}

impl WaitingSet {
    pub(crate) fn push(&self, env: Envelope) {
        self.envelopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(env);
    }

    pub(crate) fn len(&self) -> usize {
        self.envelopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub(crate) fn drain_all(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.envelopes.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Step 1 of the worker loop: a non-blocking attempt to promote every
    /// envelope whose readiness predicate has flipped to true since it was
    /// parked here. Returns `false` without touching anything if another
    /// worker currently holds the lock — exactly one winner per cycle, the
    /// rest fall through to waiting on the ready queue instead.
    pub(crate) fn try_promote(&self, ready: &ReadyQueue, counters: &Counters) -> bool {
        let mut guard = match self.envelopes.try_lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let mut i = 0;
        while i < guard.len() {
            if guard[i].is_ready() {
                let env = guard.swap_remove(i);
                // Count the envelope as queued before it stops being counted
                // as waiting, and before it becomes dequeuable, so a
                // concurrent total() never dips below the true count.
                counters.inc_queued();
                ready.push(env);
                counters.dec_waiting();
            } else {
                i += 1;
            }
        }
        true
    }
}

/// FIFO of envelopes submitted in deferred mode; never touched by workers.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    pub(crate) queue: Mutex<VecDeque<Envelope>>,
}

impl DeferredQueue {
    pub(crate) fn push(&self, env: Envelope) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(env);
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
