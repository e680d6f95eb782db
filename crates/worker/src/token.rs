use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic id source for dispatched jobs.
#[derive(Debug, Default, Clone)]
pub struct JobClock {
	next: Arc<AtomicU64>,
}

impl JobClock {
	/// Creates a clock whose first id is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next job id.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Job-scoped cancellation token.
///
/// Cancellation is cooperative: holders poll [`Self::is_cancelled`] at phase
/// boundaries or race [`Self::cancelled`] against a suspension point.
#[derive(Debug, Clone)]
pub struct JobToken {
	id: u64,
	cancel: CancellationToken,
}

impl JobToken {
	pub fn new(id: u64, cancel: CancellationToken) -> Self {
		Self { id, cancel }
	}

	/// Creates a token whose cancellation follows `parent`.
	pub fn child_of(id: u64, parent: &CancellationToken) -> Self {
		Self {
			id,
			cancel: parent.child_token(),
		}
	}

	pub const fn id(&self) -> u64 {
		self.id
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Returns the underlying cancellation token.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}
}
