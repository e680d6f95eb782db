//! Job runtime primitives for the analysis scheduler.
//!
//! - [`TaskClass`] tags every spawned task for scheduling and logs.
//! - [`JobRuntime`] tracks fire-and-forget jobs so shutdown can drain them.
//! - [`KeyedLocks`] serializes work that shares a key (a configuration scope)
//!   while independent keys proceed in parallel.
//! - [`JobClock`] and [`JobToken`] give each dispatched job a monotonic id and a
//!   cooperative cancellation handle.
//! - [`JobRegistry`] keeps a snapshot of in-flight jobs for status and bulk cancel.

mod budget;
mod class;
mod keyed;
mod queue;
mod registry;
mod runtime;
mod spawn;
mod token;

pub use budget::{DrainBudget, DrainReport};
pub use class::TaskClass;
pub use keyed::{KeyedGuard, KeyedLocks};
pub use queue::JobQueue;
pub use registry::{JobRecord, JobRegistry};
pub use runtime::JobRuntime;
pub use spawn::{spawn, spawn_blocking};
pub use token::{JobClock, JobToken};
pub use tokio_util::sync::CancellationToken;
