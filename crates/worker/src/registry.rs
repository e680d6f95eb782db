use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::TaskClass;

/// Snapshot of one in-flight job.
#[derive(Debug, Clone)]
pub struct JobRecord {
	pub id: u64,
	pub name: String,
	/// Grouping key for bulk operations (the job's configuration scope).
	pub key: String,
	pub class: TaskClass,
	pub started_at: Instant,
	pub cancel: CancellationToken,
}

/// In-memory registry of in-flight jobs.
#[derive(Debug, Default, Clone)]
pub struct JobRegistry {
	inner: Arc<RwLock<HashMap<u64, JobRecord>>>,
}

impl JobRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Upserts one record.
	pub fn upsert(&self, record: JobRecord) {
		self.inner.write().insert(record.id, record);
	}

	/// Removes one record, returning it if it was present.
	pub fn remove(&self, id: u64) -> Option<JobRecord> {
		self.inner.write().remove(&id)
	}

	/// Requests cancellation of every job registered under `key`.
	///
	/// Returns how many jobs were signalled.
	pub fn cancel_key(&self, key: &str) -> usize {
		let guard = self.inner.read();
		let mut count = 0;
		for record in guard.values().filter(|r| r.key == key) {
			record.cancel.cancel();
			count += 1;
		}
		count
	}

	/// Requests cancellation of every registered job.
	pub fn cancel_all(&self) {
		for record in self.inner.read().values() {
			record.cancel.cancel();
		}
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	/// Returns snapshots sorted by id.
	pub fn snapshots(&self) -> Vec<JobRecord> {
		let mut records: Vec<_> = self.inner.read().values().cloned().collect();
		records.sort_by_key(|r| r.id);
		records
	}
}
