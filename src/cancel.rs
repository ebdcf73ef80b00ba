//! Process-visible cancellation signal shared by a pool and its running tasks.
//!
//! A [`CancellationFlag`] is created once per pool instance and flipped exactly
//! once, on abort or on destruction. Tasks that want to cooperate with shutdown
//! opt into observing it by requesting a [`StopToken`] as an extra argument at
//! submission time (see [`crate::pool::Pool::submit_cancellable`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owns the shared cancellation state for one pool instance.
///
/// Dropping or replacing a `CancellationFlag` (as [`crate::pool::Pool::reset`]
/// does) never un-sets an already-fired flag; a fresh instance always starts
/// unset.
#[derive(Debug)]
pub(crate) struct CancellationFlag {
    fired: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub(crate) fn new() -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the flag. Idempotent; never clears it back to false.
    pub(crate) fn fire(&self) {
        self.fired.store(true, Ordering::Release);
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// A lightweight, cloneable view that observers (tasks) can hold without
    /// owning the pool's lifecycle.
    pub(crate) fn view(&self) -> StopToken {
        StopToken {
            fired: self.fired.clone(),
        }
    }
}

/// A read-only view of a pool's cancellation flag.
///
/// Cheap to clone and to pass into a submitted closure. `bool::from(&token)`
/// (or [`StopToken::is_cancelled`]) tells a long-running task it should abort.
#[derive(Debug, Clone)]
pub struct StopToken {
    fired: Arc<AtomicBool>,
}

impl StopToken {
    /// Returns true once the owning pool has been aborted or dropped.
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl From<&StopToken> for bool {
    fn from(token: &StopToken) -> bool {
        token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_fired());
        assert!(!flag.view().is_cancelled());
    }

    #[test]
    fn fire_is_observed_by_views_taken_before_and_after() {
        let flag = CancellationFlag::new();
        let before = flag.view();
        flag.fire();
        let after = flag.view();
        assert!(before.is_cancelled());
        assert!(after.is_cancelled());
    }

    #[test]
    fn fire_is_idempotent() {
        let flag = CancellationFlag::new();
        flag.fire();
        flag.fire();
        assert!(flag.is_fired());
    }
}
