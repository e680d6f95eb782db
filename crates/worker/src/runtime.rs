use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinError;

use crate::budget::{DrainBudget, DrainReport};
use crate::queue::JobQueue;
use crate::registry::JobRegistry;
use crate::{TaskClass, spawn_blocking};

/// Runtime entrypoint for scheduler jobs.
///
/// Tasks passed to [`Self::submit`] are owned by the runtime and collected by
/// [`Self::reap`] and [`Self::drain`]. A running task may submit more work at
/// any time, including while a drain is waiting on it.
#[derive(Debug, Clone)]
pub struct JobRuntime {
	interactive: Arc<JobQueue>,
	background: Arc<JobQueue>,
	registry: JobRegistry,
}

impl Default for JobRuntime {
	fn default() -> Self {
		Self::new()
	}
}

impl JobRuntime {
	/// Creates a runtime with empty managed queues.
	pub fn new() -> Self {
		Self {
			interactive: Arc::new(JobQueue::new(TaskClass::Interactive)),
			background: Arc::new(JobQueue::new(TaskClass::Background)),
			registry: JobRegistry::new(),
		}
	}

	/// Spawns blocking work.
	pub fn spawn_blocking<F, R>(&self, class: TaskClass, f: F) -> tokio::task::JoinHandle<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		spawn_blocking(class, f)
	}

	/// Submits managed work drained by [`Self::drain`].
	pub fn submit<F>(&self, class: TaskClass, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.queue(class).spawn(fut);
	}

	fn queue(&self, class: TaskClass) -> &JobQueue {
		if class == TaskClass::Interactive { &self.interactive } else { &self.background }
	}

	/// Drains managed work under one budget, interactive work first.
	///
	/// Work submitted by draining tasks is picked up in the same pass.
	pub async fn drain(&self, budget: DrainBudget) -> DrainReport {
		let deadline = Instant::now() + budget.duration;
		let mut completed = 0u64;

		while (completed as usize) < budget.max_completions && Instant::now() < deadline {
			let next = if self.interactive.is_empty() { &self.background } else { &self.interactive };
			match next.join_next(deadline.saturating_duration_since(Instant::now())).await {
				Some(joined) => {
					log_panic(joined, "worker.drain.panicked");
					completed = completed.wrapping_add(1);
				}
				None => break,
			}
		}

		DrainReport {
			completed,
			pending_interactive: self.interactive.len(),
			pending_background: self.background.len(),
			budget_exhausted: completed as usize >= budget.max_completions || Instant::now() >= deadline,
		}
	}

	/// Collects already finished tasks without waiting; returns how many.
	pub async fn reap(&self) -> usize {
		let mut reaped = 0;
		for queue in [&self.interactive, &self.background] {
			for joined in queue.join_finished().await {
				log_panic(joined, "worker.reap.panicked");
				reaped += 1;
			}
		}
		reaped
	}

	/// Aborts all managed work that is still queued or running.
	pub fn abort_all(&self) {
		self.interactive.abort_all();
		self.background.abort_all();
	}

	/// Returns the shared job registry.
	pub fn registry(&self) -> &JobRegistry {
		&self.registry
	}
}

fn log_panic(joined: Result<(), JoinError>, event: &'static str) {
	if let Err(err) = joined
		&& err.is_panic()
	{
		tracing::warn!(error = %err, "{event}");
	}
}
