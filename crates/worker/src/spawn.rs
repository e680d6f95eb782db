use std::future::Future;

use tokio::task::JoinHandle;

use crate::TaskClass;

/// Spawns an async task on the current runtime with class metadata.
///
/// Must be called from within a Tokio runtime.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	tokio::spawn(fut)
}

/// Spawns blocking work on the runtime's blocking pool with class metadata.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	tokio::task::spawn_blocking(f)
}
