//! Lifecycle accounting: queued / waiting / running task counts.
//!
//! Plain atomics, cache-padded the same way the pool's hot cursors would be
//! in a lock-free structure: these three counters are touched by every
//! worker on every cycle, so keeping them on separate cache lines avoids
//! false sharing between threads that otherwise have nothing else in common.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub(crate) struct Counters {
    queued: CachePadded<AtomicUsize>,
    waiting: CachePadded<AtomicUsize>,
    running: CachePadded<AtomicUsize>,
}

impl Counters {
    pub(crate) fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn total(&self) -> usize {
        self.queued() + self.waiting() + self.running()
    }

    pub(crate) fn inc_queued(&self) {
        self.queued.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_queued(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn inc_waiting(&self) {
        self.waiting.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_waiting(&self) {
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn inc_running(&self) {
        self.running.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dec_running(&self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}
