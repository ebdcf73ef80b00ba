//! Deferred-argument wrapper: the uniform adapter between "a value I already
//! have" and "a value some other submission will eventually produce".

use crate::error::PoolError;
use crate::handle::Consumer;

/// One submitted argument: either a value in hand, or a pending result from
/// an earlier submission.
///
/// `is_ready` never regresses from `true` to `false`, and `take` may only be
/// called once — both invariants follow directly from [`Consumer`]'s own
/// single-assignment slot.
pub enum Arg<T> {
    Immediate(T),
    Pending(Consumer<T>),
}

impl<T> Arg<T> {
    /// Wraps a value that is already available.
    pub fn value(value: T) -> Self {
        Arg::Immediate(value)
    }

    /// Wraps a consumer handle produced by an earlier submission.
    pub fn pending(consumer: Consumer<T>) -> Self {
        Arg::Pending(consumer)
    }

    /// Side-effect-free, idempotent readiness check.
    pub(crate) fn is_ready(&self) -> bool {
        match self {
            Arg::Immediate(_) => true,
            Arg::Pending(consumer) => consumer.is_ready(),
        }
    }

    /// Consumes the wrapper, producing the underlying value.
    ///
    /// Must only be called once `is_ready()` is true; on a pending argument
    /// this surfaces the upstream submission's own failure (e.g. `Cancelled`)
    /// rather than panicking, so a cancelled dependency propagates cleanly
    /// to every downstream submission.
    pub(crate) fn take(self) -> Result<T, PoolError> {
        match self {
            Arg::Immediate(value) => Ok(value),
            Arg::Pending(consumer) => consumer.take(),
        }
    }
}

impl<T> From<Consumer<T>> for Arg<T> {
    fn from(consumer: Consumer<T>) -> Self {
        Arg::Pending(consumer)
    }
}

// There is deliberately no blanket `impl<T> From<T> for Arg<T>`: it would
// overlap with the impl above under the coherence checker once `T` is
// allowed to range over `Consumer<U>` too. Wrapping an immediate value goes
// through `Arg::value` instead.

/// A fixed-arity collection of [`Arg`]s whose combined readiness is the
/// conjunction of its members', and which can be consumed once into a plain
/// tuple of values.
///
/// Implemented for arities 0 through 4, matching the submission front-end's
/// explicit entry points.
pub(crate) trait ArgTuple: Send + 'static {
    type Output: Send + 'static;

    fn all_ready(&self) -> bool;
    fn take_all(self) -> Result<Self::Output, PoolError>;
}

impl ArgTuple for () {
    type Output = ();
    fn all_ready(&self) -> bool {
        true
    }
    fn take_all(self) -> Result<(), PoolError> {
        Ok(())
    }
}

macro_rules! impl_arg_tuple {
    ($($idx:tt => $t:ident),+) => {
        impl<$($t),+> ArgTuple for ($(Arg<$t>,)+)
        where
            $($t: Send + 'static),+
        {
            type Output = ($($t,)+);

            fn all_ready(&self) -> bool {
                $(self.$idx.is_ready())&&+
            }

            fn take_all(self) -> Result<Self::Output, PoolError> {
                Ok(($(self.$idx.take()?,)+))
            }
        }
    };
}

impl_arg_tuple!(0 => A);
impl_arg_tuple!(0 => A, 1 => B);
impl_arg_tuple!(0 => A, 1 => B, 2 => C);
impl_arg_tuple!(0 => A, 1 => B, 2 => C, 3 => D);
