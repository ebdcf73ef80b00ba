use crate::error::PoolError;

/// The single-assignment slot shared by a [`super::Producer`] and [`super::Consumer`].
///
/// `Taken` is a fourth state beyond the three named in the data model: it
/// exists purely so a second [`super::Consumer::take`] can be rejected with
/// [`PoolError::HandleDoubleTake`] instead of silently returning garbage.
pub(super) enum Slot<T> {
    Empty,
    Value(T),
    Failure(PoolError),
    Taken,
}

/// Non-destructive snapshot of a slot's state, returned by `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Empty,
    HasValue,
    HasFailure,
}

impl<T> Slot<T> {
    pub(super) fn peek(&self) -> PollState {
        match self {
            Slot::Empty => PollState::Empty,
            Slot::Value(_) => PollState::HasValue,
            Slot::Failure(_) => PollState::HasFailure,
            // A taken slot reads as non-empty to anyone still polling it;
            // the double-take error only fires on an actual `take`.
            Slot::Taken => PollState::HasValue,
        }
    }

    pub(super) fn is_filled(&self) -> bool {
        !matches!(self, Slot::Empty)
    }
}
