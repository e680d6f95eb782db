//! Per-scope backend readiness.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use sonde_primitives::ScopeId;

type ReadyMap = FxHashMap<ScopeId, bool>;

/// Map from configuration scope to a ready flag.
///
/// Reads are wait-free loads of an immutable snapshot; writes publish a new
/// snapshot with a compare-and-swap loop. Unknown scopes are not ready.
#[derive(Debug, Default)]
pub struct ReadinessCache {
	snap: ArcSwap<ReadyMap>,
}

impl ReadinessCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores the flag and returns the previous value.
	pub fn set_ready(&self, scope: &ScopeId, ready: bool) -> bool {
		loop {
			let old = self.snap.load_full();
			let previous = old.get(scope).copied().unwrap_or(false);
			if previous == ready && old.contains_key(scope) {
				return previous;
			}
			let mut next = ReadyMap::clone(&old);
			next.insert(scope.clone(), ready);
			let prev = self.snap.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				tracing::debug!(scope = %scope, ready, "readiness.set");
				return previous;
			}
		}
	}

	pub fn is_ready(&self, scope: &ScopeId) -> bool {
		self.snap.load().get(scope).copied().unwrap_or(false)
	}

	/// Returns the first scope in `scopes` that is not ready.
	pub fn first_not_ready<'a>(&self, scopes: impl IntoIterator<Item = &'a ScopeId>) -> Option<&'a ScopeId> {
		let snap = self.snap.load();
		scopes.into_iter().find(|scope| !snap.get(*scope).copied().unwrap_or(false))
	}

	/// Forgets a scope entirely.
	pub fn remove(&self, scope: &ScopeId) {
		self.snap.rcu(|old| {
			let mut next = ReadyMap::clone(old);
			next.remove(scope);
			next
		});
	}
}
