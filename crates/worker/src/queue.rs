use std::collections::VecDeque;
use std::future::Future;

use parking_lot::Mutex;
use tokio::task::{JoinError, JoinHandle};

use crate::TaskClass;

/// Class-tagged queue of spawned tasks awaiting collection.
///
/// The lock is only held to push or pop handles, never across an await, so a
/// task may submit follow-up work while another caller is draining.
#[derive(Debug)]
pub struct JobQueue {
	class: TaskClass,
	handles: Mutex<VecDeque<JoinHandle<()>>>,
}

impl JobQueue {
	pub fn new(class: TaskClass) -> Self {
		Self {
			class,
			handles: Mutex::new(VecDeque::new()),
		}
	}

	/// Tasks not yet collected, finished or not.
	pub fn len(&self) -> usize {
		self.handles.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.lock().is_empty()
	}

	/// Spawns `fut` on the current runtime and queues its handle.
	pub fn spawn<F>(&self, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let handle = crate::spawn(self.class, fut);
		let mut handles = self.handles.lock();
		handles.push_back(handle);
		tracing::trace!(worker_class = self.class.as_str(), pending = handles.len(), "worker.queue.spawn");
	}

	/// Waits up to `timeout` for the oldest task.
	///
	/// Returns `None` if the queue is empty or the task did not finish in
	/// time; an unfinished task keeps its place at the front.
	pub async fn join_next(&self, timeout: std::time::Duration) -> Option<Result<(), JoinError>> {
		let mut handle = self.handles.lock().pop_front()?;
		match tokio::time::timeout(timeout, &mut handle).await {
			Ok(joined) => Some(joined),
			Err(_) => {
				self.handles.lock().push_front(handle);
				None
			}
		}
	}

	/// Collects finished tasks without waiting on running ones.
	pub async fn join_finished(&self) -> Vec<Result<(), JoinError>> {
		let finished: VecDeque<_> = {
			let mut handles = self.handles.lock();
			let (done, running) = handles.drain(..).partition(|h: &JoinHandle<()>| h.is_finished());
			*handles = running;
			done
		};
		let mut out = Vec::with_capacity(finished.len());
		for handle in finished {
			out.push(handle.await);
		}
		out
	}

	pub fn abort_all(&self) {
		for handle in self.handles.lock().drain(..) {
			handle.abort();
		}
	}
}
