//! Bookkeeping of analyses dispatched to the engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sonde_primitives::{RelPath, ScopeId};
use sonde_worker::TaskClass;
use tokio::task::JoinHandle;

use crate::trigger::TriggerKind;

/// One analysis the engine is working on.
#[derive(Debug, Clone)]
pub struct AnalysisState {
	pub id: u64,
	pub scope: ScopeId,
	pub files: Vec<RelPath>,
	pub trigger: TriggerKind,
	pub started_at: Instant,
}

/// In-flight analyses keyed by id.
///
/// An entry is removed when the engine signals completion. If it never does,
/// [`Self::retire_after`] removes it once the grace period has passed.
#[derive(Debug, Default, Clone)]
pub struct AnalysisStates {
	inner: Arc<Mutex<FxHashMap<u64, AnalysisState>>>,
}

impl AnalysisStates {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn begin(&self, state: AnalysisState) {
		tracing::trace!(analysis_id = state.id, scope = %state.scope, files = state.files.len(), "analysis.state.begin");
		self.inner.lock().insert(state.id, state);
	}

	/// Removes the state on the engine's completion signal.
	pub fn complete(&self, id: u64) -> Option<AnalysisState> {
		let state = self.inner.lock().remove(&id);
		if let Some(state) = &state {
			tracing::trace!(analysis_id = id, elapsed_ms = state.started_at.elapsed().as_millis() as u64, "analysis.state.complete");
		}
		state
	}

	/// Schedules forced removal of `id` after `grace`.
	///
	/// The task resolves to true if it had to retire the state.
	pub fn retire_after(&self, id: u64, grace: Duration) -> JoinHandle<bool> {
		let states = self.clone();
		sonde_worker::spawn(TaskClass::Background, async move {
			tokio::time::sleep(grace).await;
			match states.inner.lock().remove(&id) {
				Some(state) => {
					tracing::warn!(analysis_id = id, scope = %state.scope, "Engine never signalled completion, retiring analysis state");
					true
				}
				None => false,
			}
		})
	}

	pub fn contains(&self, id: u64) -> bool {
		self.inner.lock().contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.inner.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.lock().is_empty()
	}

	pub fn in_flight(&self) -> Vec<u64> {
		let mut ids: Vec<u64> = self.inner.lock().keys().copied().collect();
		ids.sort_unstable();
		ids
	}
}
