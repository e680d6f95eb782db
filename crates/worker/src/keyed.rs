use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Mutual exclusion keyed by value.
///
/// Holders of the same key are serialized in FIFO order; different keys never
/// wait on each other. Slots are created on demand and pruned when the last
/// holder or waiter releases them, so the map only contains contended keys.
pub struct KeyedLocks<K> {
	slots: Slots<K>,
}

impl<K> Clone for KeyedLocks<K> {
	fn clone(&self) -> Self {
		Self {
			slots: Arc::clone(&self.slots),
		}
	}
}

impl<K> Default for KeyedLocks<K> {
	fn default() -> Self {
		Self {
			slots: Arc::new(Mutex::new(HashMap::new())),
		}
	}
}

impl<K> fmt::Debug for KeyedLocks<K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyedLocks").field("slots", &self.slots.lock().len()).finish()
	}
}

impl<K> KeyedLocks<K>
where
	K: Eq + Hash + Clone + fmt::Debug,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Waits until `key` is free and takes it.
	pub async fn lock(&self, key: K) -> KeyedGuard<K> {
		let slot = {
			let mut slots = self.slots.lock();
			Arc::clone(slots.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
		};
		let guard = slot.lock_owned().await;
		tracing::trace!(key = ?key, "worker.keyed.acquired");
		KeyedGuard {
			key,
			slots: Arc::clone(&self.slots),
			guard: Some(guard),
		}
	}

	/// Takes `key` if it is free right now.
	pub fn try_lock(&self, key: K) -> Option<KeyedGuard<K>> {
		let mut slots = self.slots.lock();
		let slot = Arc::clone(slots.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))));
		match slot.try_lock_owned() {
			Ok(guard) => Some(KeyedGuard {
				key,
				slots: Arc::clone(&self.slots),
				guard: Some(guard),
			}),
			Err(_) => None,
		}
	}

	/// Returns true while some holder owns `key`.
	pub fn is_locked(&self, key: &K) -> bool {
		self.slots.lock().get(key).is_some_and(|slot| slot.try_lock().is_err())
	}

	/// Number of keys currently held or waited on.
	pub fn active_keys(&self) -> usize {
		self.slots.lock().len()
	}
}

/// Ownership of one key in a [`KeyedLocks`]; released on drop.
pub struct KeyedGuard<K>
where
	K: Eq + Hash,
{
	key: K,
	slots: Slots<K>,
	guard: Option<OwnedMutexGuard<()>>,
}

impl<K> KeyedGuard<K>
where
	K: Eq + Hash,
{
	pub fn key(&self) -> &K {
		&self.key
	}
}

impl<K> Drop for KeyedGuard<K>
where
	K: Eq + Hash,
{
	fn drop(&mut self) {
		let mut slots = self.slots.lock();
		drop(self.guard.take());
		// Waiters clone the slot under the map lock, so a count of one means
		// nobody else can reach it anymore.
		if slots.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
			slots.remove(&self.key);
		}
	}
}
