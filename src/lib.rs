//! A fixed-size worker pool for heterogeneous tasks whose inputs may not yet
//! be available.
//!
//! Submitted tasks can depend on values that other pool tasks will
//! eventually produce: the pool accepts such tasks immediately, parks them
//! until their inputs are ready, and only then schedules them onto worker
//! threads. Every submission returns a [`handle::Consumer`] through which a
//! caller observes completion, retrieves a result, or re-raises a failure. A
//! cooperative [`cancel::StopToken`] lets long-running tasks notice pool
//! shutdown.
//!
//! ## Example
//!
//! ```
//! use task_pool::Pool;
//!
//! let pool = Pool::new(2);
//!
//! let a = pool.submit(|| 7);
//! let b = pool.submit_with(a, |x: i32| x * 6);
//!
//! assert_eq!(b.take().unwrap(), 42);
//! ```
//!
//! ## Dependent submissions
//!
//! A submission's arguments can be a mix of plain values and consumer
//! handles from earlier submissions ([`arg::Arg`]); the envelope built from
//! them only becomes ready, and only then gets scheduled onto a worker, once
//! every dependency has completed.
//!
//! ## Cancellation
//!
//! ```
//! use std::time::Duration;
//! use task_pool::Pool;
//!
//! let pool = Pool::new(1);
//! let handle = pool.submit_cancellable(|stop| {
//!     while !stop.is_cancelled() {
//!         std::thread::sleep(Duration::from_millis(1));
//!     }
//! });
//! drop(pool); // fires the cancellation flag, joins the worker, and discards its result
//! assert!(matches!(handle.take(), Err(task_pool::PoolError::Cancelled)));
//! ```

mod alloc;
mod arg;
mod cancel;
mod counters;
mod envelope;
mod error;
mod handle;
mod pool;
mod queue;
mod submit;
mod worker;

pub use alloc::{Allocator, SystemAllocator};
pub use arg::Arg;
pub use cancel::StopToken;
pub use error::{PoolError, PoolResult};
pub use handle::{Consumer, PollState};
pub use pool::{DEFAULT_CHECK_LATENCY, Pool};
